//! Storage abstraction trait and common types.

use std::io::{Read, Seek, Write};

use crate::error::{FeedrankError, Result};

/// A trait for storage backends that can store and retrieve named files.
///
/// Index snapshots and the `CURRENT` pointer are written through this
/// interface, so an index can live on disk or entirely in memory.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open a file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create (or truncate) a file for writing.
    ///
    /// The file becomes visible to readers once the output is closed.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file. Deleting a missing file is not an error.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files in the storage, sorted by name.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Rename a file, replacing the destination if it exists.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Acquire an exclusive named lock. Fails if the lock is already held.
    fn acquire_lock(&self, name: &str) -> Result<Box<dyn StorageLock>>;

    /// Whether a named lock is currently held.
    fn is_locked(&self, name: &str) -> bool;

    /// Sync all pending writes to storage.
    fn sync(&self) -> Result<()>;

    /// Close the storage. Every later operation fails.
    fn close(&self) -> Result<()>;

    /// Whether [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;

    /// Read a whole file into memory.
    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let mut input = self.open_input(name)?;
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Write a whole file and close it.
    fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let mut output = self.create_output(name)?;
        output.write_all(data)?;
        output.flush_and_sync()?;
        output.close()
    }
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    /// Get the size of the input stream.
    fn size(&self) -> Result<u64>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush and sync the output to storage.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Number of bytes written so far.
    fn position(&self) -> u64;

    /// Close the output stream, publishing its contents.
    fn close(&mut self) -> Result<()>;
}

/// A held lock on a named resource. Released on drop.
pub trait StorageLock: Send + std::fmt::Debug {
    /// Get the name of the lock.
    fn name(&self) -> &str;

    /// Release the lock explicitly.
    fn release(&mut self) -> Result<()>;

    /// Check if the lock is still held.
    fn is_valid(&self) -> bool;
}

/// Error types specific to storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// File not found.
    FileNotFound(String),

    /// I/O error.
    IoError(String),

    /// Lock acquisition failed.
    LockFailed(String),

    /// Storage is closed.
    StorageClosed,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::IoError(msg) => write!(f, "I/O error: {msg}"),
            StorageError::LockFailed(name) => write!(f, "Failed to acquire lock: {name}"),
            StorageError::StorageClosed => write!(f, "Storage is closed"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for FeedrankError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::StorageClosed => FeedrankError::unavailable(err.to_string()),
            _ => FeedrankError::storage(err.to_string()),
        }
    }
}
