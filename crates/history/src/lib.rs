//! Conversation history backends for murmur.
//!
//! The core reads a bounded window and appends; everything else about
//! storage is this crate's business. Only the in-memory backend ships —
//! persistence schema design is explicitly out of scope, and the store is
//! reached through the `ConversationStore` trait so a durable backend can
//! slot in without touching the core.

pub mod in_memory;

pub use in_memory::InMemoryStore;
