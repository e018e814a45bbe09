//! Session settings

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Role of the synthetic greeting emitted when a session starts
    #[serde(default = "default_greeting_role")]
    pub greeting_role: String,

    #[serde(default = "default_greeting_message")]
    pub greeting_message: String,

    /// Sessions untouched for this long are evicted. 0 disables the reaper.
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,

    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,

    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting_role: default_greeting_role(),
            greeting_message: default_greeting_message(),
            idle_ttl_secs: default_idle_ttl_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_greeting_role() -> String {
    "greeting_assistant".to_string()
}

fn default_greeting_message() -> String {
    "Hello there!".to_string()
}

fn default_idle_ttl_secs() -> u64 {
    30 * 60
}

fn default_reap_interval_secs() -> u64 {
    60
}

fn default_max_sessions() -> usize {
    1000
}
