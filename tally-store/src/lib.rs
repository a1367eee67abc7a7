//! Durable storage for split expenses, profiles, groups and the wallet journal.

mod error;
mod memory;
mod repository;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryRepository;
pub use repository::{SplitRepository, SplitTransaction};
pub use sqlite::SqliteRepository;
