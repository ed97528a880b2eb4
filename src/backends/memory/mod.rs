//! In-memory storage backend.

mod fs;

pub use fs::MemoryBackend;
