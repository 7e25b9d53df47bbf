//! Content source adapters.

mod file;
mod memory;

pub use file::TomlContentSource;
pub use memory::{MemoryContentSource, SourceHold};
