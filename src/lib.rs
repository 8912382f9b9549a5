// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod dialogue_map;
pub mod error;
pub mod metrics;
pub mod negation;
pub mod policy;
pub mod practitioner;
pub mod scoring;
pub mod symptoms;

// `symptom_triage::router` as well as `symptom_triage::api::router`
pub use crate::api::{router, AppState};
pub use crate::policy::{AssistantReply, ConversationTurn, Role};
