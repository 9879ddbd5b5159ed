//! Committed, immutable index snapshots.
//!
//! Every commit writes one self-contained file `snapshot_<generation>.bin`
//! and then repoints the `CURRENT` file at that generation. A snapshot file
//! is laid out as:
//!
//! | bytes | content                                   |
//! |-------|-------------------------------------------|
//! | 4     | magic `FRSN`                              |
//! | 4     | format version (u32, big-endian)          |
//! | 4     | CRC-32 of the body (u32, big-endian)      |
//! | 8     | body length (u64, big-endian)             |
//! | n     | bincode-encoded [`Snapshot`]              |

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FeedrankError, Result};
use crate::index::document::FieldValue;
use crate::index::reader::Posting;
use crate::storage::Storage;

/// File naming the committed generation.
pub const CURRENT_FILE: &str = "CURRENT";

/// Name of the writer lock.
pub const WRITE_LOCK: &str = "write.lock";

const MAGIC: &[u8; 4] = b"FRSN";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 20;
const TEMP_SUFFIX: &str = ".tmp";

/// File name of the snapshot for a generation.
pub fn snapshot_file_name(generation: u64) -> String {
    format!("snapshot_{generation}.bin")
}

fn parse_snapshot_file_name(name: &str) -> Option<u64> {
    name.strip_prefix("snapshot_")?
        .strip_suffix(".bin")?
        .parse()
        .ok()
}

/// A document as it lives inside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// Stored fields in insertion order, statistics side fields included.
    pub stored: Vec<(String, FieldValue)>,

    /// Indexed terms per field with their in-document frequency, sorted by term.
    pub indexed: BTreeMap<String, Vec<(String, u32)>>,

    /// Fields whose term vectors may be handed out.
    pub term_vector_fields: Vec<String>,
}

impl SnapshotDocument {
    /// Whether the document holds `key` as an indexed term of `field`.
    pub fn has_term(&self, field: &str, key: &str) -> bool {
        self.indexed
            .get(field)
            .is_some_and(|terms| terms.binary_search_by(|(term, _)| term.as_str().cmp(key)).is_ok())
    }
}

/// The full contents of one committed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub generation: u64,
    pub committed_at: DateTime<Utc>,

    /// Live documents; the position is the internal document id.
    pub documents: Vec<SnapshotDocument>,

    /// Field -> term -> postings sorted by document id.
    pub postings: BTreeMap<String, BTreeMap<String, Vec<Posting>>>,
}

impl Snapshot {
    /// Build a snapshot over `documents`, assigning dense internal ids.
    pub fn build(generation: u64, documents: Vec<SnapshotDocument>) -> Self {
        let mut postings: BTreeMap<String, BTreeMap<String, Vec<Posting>>> = BTreeMap::new();

        for (doc_id, doc) in documents.iter().enumerate() {
            for (field, terms) in &doc.indexed {
                let field_postings = postings.entry(field.clone()).or_default();
                for (term, term_freq) in terms {
                    field_postings.entry(term.clone()).or_default().push(Posting {
                        doc_id: doc_id as u32,
                        term_freq: *term_freq,
                    });
                }
            }
        }

        Snapshot {
            generation,
            committed_at: Utc::now(),
            documents,
            postings,
        }
    }

    /// Serialize into the on-disk layout.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)?;
        let checksum = crc32fast::hash(&body);

        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.write_all(MAGIC)?;
        out.write_u32::<BigEndian>(VERSION)?;
        out.write_u32::<BigEndian>(checksum)?;
        out.write_u64::<BigEndian>(body.len() as u64)?;
        out.write_all(&body)?;
        Ok(out)
    }

    /// Parse and verify the on-disk layout.
    ///
    /// Any framing or checksum mismatch is reported as `IndexUnavailable`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(FeedrankError::unavailable("snapshot is truncated"));
        }

        let mut cursor = Cursor::new(bytes);
        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(FeedrankError::unavailable("snapshot has a bad magic number"));
        }

        let version = cursor.read_u32::<BigEndian>()?;
        if version != VERSION {
            return Err(FeedrankError::unavailable(format!(
                "unsupported snapshot version {version}"
            )));
        }

        let checksum = cursor.read_u32::<BigEndian>()?;
        let body_len = cursor.read_u64::<BigEndian>()? as usize;
        let body = &bytes[HEADER_LEN..];
        if body.len() != body_len {
            return Err(FeedrankError::unavailable("snapshot body length mismatch"));
        }
        if crc32fast::hash(body) != checksum {
            return Err(FeedrankError::unavailable("snapshot checksum mismatch"));
        }

        bincode::deserialize(body)
            .map_err(|e| FeedrankError::unavailable(format!("snapshot body is unreadable: {e}")))
    }

    /// Write this snapshot and make it the current generation.
    ///
    /// The snapshot file is written under a temporary name and renamed into
    /// place before `CURRENT` is replaced the same way, so a reader sees
    /// either the previous generation or this one.
    pub fn publish(&self, storage: &dyn Storage) -> Result<()> {
        let name = snapshot_file_name(self.generation);
        write_atomically(storage, &name, &self.encode()?)?;
        write_atomically(storage, CURRENT_FILE, self.generation.to_string().as_bytes())?;
        storage.sync()?;

        // Keep the previous generation for readers that raced the commit.
        for file in storage.list_files()? {
            if let Some(generation) = parse_snapshot_file_name(&file)
                && generation + 1 < self.generation
            {
                storage.delete_file(&file)?;
            }
        }
        Ok(())
    }

    /// Load the generation named by `CURRENT`.
    pub fn load_current(storage: &dyn Storage) -> Result<Self> {
        let generation = current_generation(storage)?.ok_or_else(|| {
            FeedrankError::unavailable("no committed snapshot (CURRENT is missing)")
        })?;
        Self::load(storage, generation)
    }

    /// Load a specific generation.
    pub fn load(storage: &dyn Storage, generation: u64) -> Result<Self> {
        let name = snapshot_file_name(generation);
        if !storage.file_exists(&name) {
            return Err(FeedrankError::unavailable(format!("snapshot {name} is missing")));
        }
        let snapshot = Self::decode(&storage.read_file(&name)?)?;
        if snapshot.generation != generation {
            return Err(FeedrankError::unavailable(format!(
                "snapshot {name} holds generation {}",
                snapshot.generation
            )));
        }
        Ok(snapshot)
    }
}

/// The generation named by `CURRENT`, or `None` for a fresh index.
pub fn current_generation(storage: &dyn Storage) -> Result<Option<u64>> {
    if !storage.file_exists(CURRENT_FILE) {
        return Ok(None);
    }
    let data = storage.read_file(CURRENT_FILE)?;
    let text = String::from_utf8_lossy(&data);
    text.trim()
        .parse()
        .map(Some)
        .map_err(|_| FeedrankError::unavailable(format!("CURRENT is malformed: {text:?}")))
}

fn write_atomically(storage: &dyn Storage, name: &str, data: &[u8]) -> Result<()> {
    let temp = format!("{name}{TEMP_SUFFIX}");
    storage.write_file(&temp, data)?;
    storage.rename_file(&temp, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn doc(terms: &[(&str, u32)]) -> SnapshotDocument {
        let mut doc = SnapshotDocument::default();
        doc.indexed.insert(
            "content".to_string(),
            terms.iter().map(|(t, f)| (t.to_string(), *f)).collect(),
        );
        doc
    }

    #[test]
    fn test_build_assigns_dense_ids() {
        let snapshot = Snapshot::build(1, vec![doc(&[("a", 2), ("b", 1)]), doc(&[("a", 1)])]);

        let a = &snapshot.postings["content"]["a"];
        assert_eq!(a.len(), 2);
        assert_eq!(a[0], Posting { doc_id: 0, term_freq: 2 });
        assert_eq!(a[1], Posting { doc_id: 1, term_freq: 1 });
        assert_eq!(snapshot.postings["content"]["b"].len(), 1);
    }

    #[test]
    fn test_publish_and_load() {
        let storage = MemoryStorage::new();
        assert_eq!(current_generation(&storage).unwrap(), None);
        assert!(Snapshot::load_current(&storage).unwrap_err().is_unavailable());

        Snapshot::build(1, vec![doc(&[("x", 1)])]).publish(&storage).unwrap();
        Snapshot::build(2, vec![]).publish(&storage).unwrap();
        Snapshot::build(3, vec![]).publish(&storage).unwrap();

        assert_eq!(current_generation(&storage).unwrap(), Some(3));
        assert_eq!(Snapshot::load_current(&storage).unwrap().generation, 3);
        assert!(!storage.file_exists("snapshot_1.bin"));
        assert!(storage.file_exists("snapshot_2.bin"));
    }

    #[test]
    fn test_corruption_is_detected() {
        let mut bytes = Snapshot::build(1, vec![doc(&[("x", 1)])]).encode().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(Snapshot::decode(&bytes).unwrap_err().is_unavailable());

        assert!(Snapshot::decode(b"nope").unwrap_err().is_unavailable());
    }

    #[test]
    fn test_has_term() {
        let d = doc(&[("alpha", 1), ("beta", 2)]);
        assert!(d.has_term("content", "beta"));
        assert!(!d.has_term("content", "gamma"));
        assert!(!d.has_term("title", "alpha"));
    }
}
