pub mod memory;
pub mod repo;
pub mod sqlite;

pub use memory::MemoryStateStore;
pub use repo::{AgentMemory, StateStore};
pub use sqlite::SqliteStateStore;
