//! QuestForge Store — durable store implementations.
//!
//! Currently a single in-process implementation; anything satisfying the
//! `SessionStore` trait in `questforge-core` can replace it.

pub mod memory;

pub use memory::MemoryStore;
