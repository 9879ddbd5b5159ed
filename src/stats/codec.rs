//! Statistics codec for the per-document side field.
//!
//! Every indexed field `f` of a document gets a stored, never-indexed
//! companion field `f_etdat` holding that document's [`DocStat`] for `f`.
//!
//! # Format (version 1)
//!
//! Eight bytes: the token count followed by the unique-term count, each an
//! unsigned 32-bit integer in big-endian (network) byte order.
//!
//! # Examples
//!
//! ```
//! use feedrank::stats::codec::{self, DocStat};
//!
//! let bytes = codec::encode(DocStat::new(12, 9));
//! assert_eq!(bytes, [0, 0, 0, 12, 0, 0, 0, 9]);
//! assert_eq!(codec::decode(Some(&bytes)).unwrap(), DocStat::new(12, 9));
//! assert_eq!(codec::stats_field_name("content"), "content_etdat");
//! ```

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::error::{FeedrankError, Result};

/// Reserved suffix of statistics side fields.
pub const STATS_FIELD_SUFFIX: &str = "_etdat";

/// Size of an encoded [`DocStat`] in bytes.
pub const ENCODED_LEN: usize = 8;

/// Version of the side-field payload layout.
pub const FORMAT_VERSION: u32 = 1;

/// Per-document, per-field term statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocStat {
    /// Number of tokens in the field after analysis.
    pub token_count: u32,

    /// Number of distinct terms in the field after analysis.
    pub unique_term_count: u32,
}

impl DocStat {
    /// Create a new statistic record.
    pub fn new(token_count: u32, unique_term_count: u32) -> Self {
        DocStat {
            token_count,
            unique_term_count,
        }
    }
}

/// Encode a statistic into its fixed 8-byte payload.
pub fn encode(stat: DocStat) -> [u8; ENCODED_LEN] {
    let mut buf = [0u8; ENCODED_LEN];
    BigEndian::write_u32(&mut buf[0..4], stat.token_count);
    BigEndian::write_u32(&mut buf[4..8], stat.unique_term_count);
    buf
}

/// Decode a payload read from a side field.
///
/// # Arguments
///
/// * `bytes` - The stored payload, or `None` when the document has no side field
///
/// # Returns
///
/// The decoded statistic, or `CorruptStats` if the payload is absent or is
/// not exactly [`ENCODED_LEN`] bytes long.
pub fn decode(bytes: Option<&[u8]>) -> Result<DocStat> {
    let bytes = bytes.ok_or_else(|| FeedrankError::corrupt_stats("statistics field is absent"))?;
    if bytes.len() != ENCODED_LEN {
        return Err(FeedrankError::corrupt_stats(format!(
            "expected {ENCODED_LEN} bytes, found {}",
            bytes.len()
        )));
    }

    Ok(DocStat {
        token_count: BigEndian::read_u32(&bytes[0..4]),
        unique_term_count: BigEndian::read_u32(&bytes[4..8]),
    })
}

/// Name of the side field carrying statistics for `field`.
pub fn stats_field_name(field: &str) -> String {
    format!("{field}{STATS_FIELD_SUFFIX}")
}

/// Whether `field` is a statistics side field name.
pub fn is_stats_field(field: &str) -> bool {
    field.ends_with(STATS_FIELD_SUFFIX)
}

/// Reject caller field names that would collide with side fields.
///
/// A caller field named `x_etdat` would be indistinguishable from the
/// statistics of a field `x`, so such names are refused outright.
pub fn validate_field_name(field: &str) -> Result<()> {
    if field.is_empty() {
        return Err(FeedrankError::index("field name must not be empty"));
    }
    if is_stats_field(field) {
        return Err(FeedrankError::index(format!(
            "field name '{field}' uses the reserved suffix '{STATS_FIELD_SUFFIX}'"
        )));
    }
    Ok(())
}
