//! QuestForge Generator — client for the narrative generation service.
//!
//! The service itself (prompt construction, the language-model call) is an
//! external collaborator; this crate only speaks its wire contract.

pub mod http;

pub use http::HttpGenerator;
