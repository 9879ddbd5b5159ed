//! File-based storage implementation.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{FeedrankError, Result};
use crate::storage::traits::{Storage, StorageError, StorageInput, StorageLock, StorageOutput};

/// Suffix for in-flight output files; they are renamed into place on close.
const PENDING_SUFFIX: &str = ".pending";

/// A file-based storage rooted at a directory.
#[derive(Debug)]
pub struct FileStorage {
    directory: PathBuf,
    buffer_size: usize,
    closed: AtomicBool,
}

impl FileStorage {
    /// Create a new file storage in the given directory, creating it if needed.
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        if !directory.exists() {
            fs::create_dir_all(&directory)
                .map_err(|e| FeedrankError::storage(format!("Failed to create directory: {e}")))?;
        }

        if !directory.is_dir() {
            return Err(FeedrankError::storage(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        Ok(FileStorage {
            directory,
            buffer_size: 64 * 1024,
            closed: AtomicBool::new(false),
        })
    }

    /// Open an existing storage directory without creating it.
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let path = directory.as_ref();
        if !path.is_dir() {
            return Err(FeedrankError::unavailable(format!(
                "Index directory does not exist: {}",
                path.display()
            )));
        }
        Self::new(path)
    }

    /// The root directory of this storage.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StorageError::StorageClosed.into())
        } else {
            Ok(())
        }
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        self.check_closed()?;

        let file = File::open(self.file_path(name)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::FileNotFound(name.to_string())
            } else {
                StorageError::IoError(e.to_string())
            }
        })?;
        let size = file.metadata()?.len();

        Ok(Box::new(FileInput {
            reader: BufReader::with_capacity(self.buffer_size, file),
            size,
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        self.check_closed()?;

        let final_path = self.file_path(name);
        let pending_path = self.file_path(&format!("{name}{PENDING_SUFFIX}"));
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&pending_path)
            .map_err(|e| StorageError::IoError(e.to_string()))?;

        Ok(Box::new(FileOutput {
            writer: Some(BufWriter::with_capacity(self.buffer_size, file)),
            pending_path,
            final_path,
            position: 0,
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        !self.closed.load(Ordering::Acquire) && self.file_path(name).is_file()
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.check_closed()?;

        match fs::remove_file(self.file_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::IoError(e.to_string()).into()),
        }
    }

    fn list_files(&self) -> Result<Vec<String>> {
        self.check_closed()?;

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if entry.file_type()?.is_file()
                && let Some(name) = entry.file_name().to_str()
                && !name.ends_with(PENDING_SUFFIX)
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.check_closed()?;

        fs::rename(self.file_path(old_name), self.file_path(new_name)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::FileNotFound(old_name.to_string()).into()
            } else {
                FeedrankError::from(e)
            }
        })
    }

    fn acquire_lock(&self, name: &str) -> Result<Box<dyn StorageLock>> {
        self.check_closed()?;

        let path = self.file_path(name);
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    StorageError::LockFailed(name.to_string())
                } else {
                    StorageError::IoError(e.to_string())
                }
            })?;

        Ok(Box::new(FileLock {
            name: name.to_string(),
            path,
            released: false,
        }))
    }

    fn is_locked(&self, name: &str) -> bool {
        self.file_path(name).exists()
    }

    fn sync(&self) -> Result<()> {
        self.check_closed()?;
        // Directory fsync makes renames durable on unix; elsewhere it is a no-op.
        #[cfg(unix)]
        File::open(&self.directory)?.sync_all()?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A buffered file input.
#[derive(Debug)]
pub struct FileInput {
    reader: BufReader<File>,
    size: u64,
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }
}

/// A buffered file output written to a pending path and renamed on close.
#[derive(Debug)]
pub struct FileOutput {
    writer: Option<BufWriter<File>>,
    pending_path: PathBuf,
    final_path: PathBuf,
    position: u64,
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| std::io::Error::other("Output is closed"))?;
        let written = writer.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            drop(writer);
            fs::rename(&self.pending_path, &self.final_path)?;
        }
        Ok(())
    }
}

impl Drop for FileOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// A lock backed by an exclusively created lock file.
#[derive(Debug)]
struct FileLock {
    name: String,
    path: PathBuf,
    released: bool,
}

impl StorageLock for FileLock {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            self.released = true;
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn is_valid(&self) -> bool {
        !self.released && self.path.exists()
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
