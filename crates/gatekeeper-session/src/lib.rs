//! Gatekeeper Sessions
//!
//! This crate bridges a running dialogue to a request/response API:
//! - `ConversationSession` owns one dialogue run and its input/output queues
//! - `InputChannel` feeds user lines to the engine with cancellable waits
//! - `SessionManager` registers sessions, enforces capacity and reaps idle ones

pub mod config;
pub mod error;
pub mod input;
pub mod manager;
pub mod secret;
pub mod session;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use input::InputChannel;
pub use manager::SessionManager;
pub use secret::SecretCode;
pub use session::ConversationSession;
