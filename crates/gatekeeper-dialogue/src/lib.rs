//! Gatekeeper Dialogue Engine
//!
//! This crate provides the concrete turn-taking engine behind a session:
//! - Round-robin group chat with a turn limit
//! - User proxy and model-backed assistant participants
//! - Text-mention termination
//! - The gatekeeper prompts and team factory

pub mod chat;
pub mod participant;
pub mod prompts;
pub mod termination;

pub use chat::RoundRobinChat;
pub use participant::{AssistantAgent, Participant, TurnContext, UserProxy};
pub use prompts::{ASSISTANT_NAME, CANDIDATE_NAME, DEFAULT_MAX_TURNS, TASK, gatekeeper_team};
pub use termination::TextMentionTermination;
