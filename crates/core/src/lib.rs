//! # Knowdesk Core
//!
//! Domain types, service traits, and error definitions for the Knowdesk
//! knowledge assistant. This crate has **no framework dependencies** — it
//! defines the domain model that the other crates implement against.
//!
//! ## Design Philosophy
//!
//! The external AI services are traits here. Implementations live in
//! `knowdesk-providers`, which keeps the pipeline testable with scripted
//! stand-ins and the dependency graph pointing inward.

pub mod conversation;
pub mod error;
pub mod provider;
pub mod topic;
pub mod turn;
pub mod verdict;

// Re-export key types at crate root for ergonomics
pub use conversation::{ConversationLog, preview};
pub use error::{Error, ProviderError, SessionError};
pub use provider::{GenerationRequest, KnowledgeAnswer, KnowledgeBase, KnowledgeQuery, TextGenerator};
pub use topic::Topic;
pub use turn::{Role, Turn};
pub use verdict::Verdict;
