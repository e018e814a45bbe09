//! Secret code wrapper

use std::{fmt, sync::Arc};

/// The code a session releases once the gatekeeper gives in.
///
/// `Debug` is redacted so the value never reaches logs through `{:?}`.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretCode(Arc<str>);

impl SecretCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(Arc::from(code.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretCode(***)")
    }
}

impl From<String> for SecretCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl From<&str> for SecretCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}
