//! Corpus-wide field aggregates and their generation-tagged cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{FeedrankError, Result};
use crate::index::IndexReader;
use crate::stats::codec;

/// How many documents are scanned between deadline checks.
const DEADLINE_CHECK_INTERVAL: u32 = 64;

/// Totals of one field's statistics over every committed document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldAggregate {
    /// Sum of token counts.
    pub total_length: u64,

    /// Number of documents carrying statistics for the field.
    pub record_count: u32,
}

impl FieldAggregate {
    /// Average field length, or 0.0 for a field no document carries.
    pub fn avg_length(&self) -> f64 {
        if self.record_count == 0 {
            0.0
        } else {
            self.total_length as f64 / self.record_count as f64
        }
    }
}

/// Scan every document's statistics for `field`.
///
/// Documents without a statistics side field are not counted. Malformed
/// payloads are logged and skipped. If `deadline` passes mid-scan the scan
/// is abandoned with a `Timeout` error.
pub fn scan_field(
    reader: &dyn IndexReader,
    field: &str,
    deadline: Option<Instant>,
) -> Result<FieldAggregate> {
    let started = Instant::now();
    let stats_field = codec::stats_field_name(field);
    let max_doc = reader.max_doc()?;
    let mut aggregate = FieldAggregate::default();

    for doc_id in 0..max_doc {
        if doc_id % DEADLINE_CHECK_INTERVAL == 0
            && let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            return Err(FeedrankError::timeout(format!(
                "aggregate scan of '{field}' stopped after {doc_id} of {max_doc} documents"
            )));
        }

        let payload = reader.binary_field(doc_id, &stats_field)?;
        if payload.is_none() {
            continue;
        }
        match codec::decode(payload.as_deref()) {
            Ok(stat) => {
                aggregate.total_length += u64::from(stat.token_count);
                aggregate.record_count += 1;
            }
            Err(FeedrankError::CorruptStats(reason)) => {
                tracing::warn!(doc_id, field, %reason, "skipping corrupt statistics");
            }
            Err(e) => return Err(e),
        }
    }

    tracing::debug!(
        field,
        generation = reader.generation(),
        records = aggregate.record_count,
        total_length = aggregate.total_length,
        elapsed_us = started.elapsed().as_micros() as u64,
        "scanned field statistics"
    );
    Ok(aggregate)
}

type Slot<V> = Arc<Mutex<Option<V>>>;

struct CacheSlots<V> {
    generation: u64,
    slots: AHashMap<String, Slot<V>>,
}

/// Per-field values computed at most once per index generation.
///
/// Each field has its own slot lock. The first caller for a field computes
/// the value while holding that lock, so concurrent callers wait and then
/// read the cached value instead of scanning again. A failed computation
/// leaves the slot empty.
pub struct AggregateCache<V = FieldAggregate> {
    inner: Mutex<CacheSlots<V>>,
    computations: AtomicU64,
}

impl<V> std::fmt::Debug for AggregateCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("AggregateCache")
            .field("generation", &inner.generation)
            .field("fields", &inner.slots.len())
            .field("computations", &self.computations.load(Ordering::Relaxed))
            .finish()
    }
}

impl<V: Clone> AggregateCache<V> {
    /// Create an empty cache for `generation`.
    pub fn new(generation: u64) -> Self {
        AggregateCache {
            inner: Mutex::new(CacheSlots {
                generation,
                slots: AHashMap::new(),
            }),
            computations: AtomicU64::new(0),
        }
    }

    /// The generation cached values belong to.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Drop every entry if `generation` differs from the cached one.
    ///
    /// # Returns
    ///
    /// Whether anything was invalidated.
    pub fn invalidate_for(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation == generation {
            return false;
        }
        inner.generation = generation;
        inner.slots.clear();
        true
    }

    /// A cached value, without computing it.
    pub fn get(&self, field: &str, generation: u64) -> Option<V> {
        let slot = {
            let inner = self.inner.lock();
            if inner.generation != generation {
                return None;
            }
            inner.slots.get(field).cloned()?
        };
        slot.lock().clone()
    }

    /// The cached value for `field`, computing it on first use.
    ///
    /// A caller holding an older generation than the cache gets a freshly
    /// computed value that is not stored. A newer generation resets the
    /// cache first.
    pub fn get_or_compute<F>(&self, field: &str, generation: u64, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        let slot = {
            let mut inner = self.inner.lock();
            if generation > inner.generation {
                inner.generation = generation;
                inner.slots.clear();
            }
            if generation < inner.generation {
                drop(inner);
                return compute();
            }
            Arc::clone(inner.slots.entry(field.to_string()).or_default())
        };

        let mut value = slot.lock();
        if let Some(cached) = value.as_ref() {
            return Ok(cached.clone());
        }

        let computed = compute()?;
        self.computations.fetch_add(1, Ordering::Relaxed);
        *value = Some(computed.clone());
        Ok(computed)
    }

    /// Number of values computed and stored so far.
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }
}
