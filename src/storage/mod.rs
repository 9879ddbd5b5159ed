//! Storage abstraction layer.
//!
//! Index snapshots are plain named files in a [`Storage`]. Two backends are
//! provided: [`FileStorage`] for on-disk indexes and [`MemoryStorage`] for
//! tests and throwaway indexes.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use traits::{Storage, StorageError, StorageInput, StorageLock, StorageOutput};
