#![forbid(unsafe_code)]

pub mod store;
pub mod file_store;
pub mod file_directory;
pub mod sharing;
pub mod audit;

pub use store::{InMemoryStore, StoreError, TransactionStore};
