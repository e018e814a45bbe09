//! Gatekeeper Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout Gatekeeper:
//! - Chat message types shared by the dialogue engine and the model connector
//! - Dialogue engine, chat model and user input abstractions
//! - Client-facing session events
//! - Termination marker policy
//! - Core error types

pub mod engine;
pub mod error;
pub mod events;
pub mod message;
pub mod termination;

pub use error::{Error, InputError, Result};
