//! Domain layer types and invariants.

pub mod content;
pub mod content_types;
pub mod culture;
pub mod error;
pub mod slug;
