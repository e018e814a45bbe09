//! Gatekeeper Server
//!
//! Configuration loading, application wiring and the console front end used
//! by the `gatekeeper-server` binary.

pub mod app;
pub mod config;
pub mod console;
