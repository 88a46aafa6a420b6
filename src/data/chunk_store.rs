// ============================================================
// Layer 4 — Chunk Store
// ============================================================
// Owns the decoded buffers of resident chunks and their
// load / evict lifecycle.
//
// Per chunk id:
//
//   NotLoaded ──require──▶ Loaded ──release / evict──▶ Released
//       ▲                                                 │
//       └──────────────────── require ◀───────────────────┘
//
// Rules:
//   - require() on a resident chunk is a hit: no decode work,
//     returns false
//   - require() decodes every member before the chunk becomes
//     Loaded; one failure leaves the chunk NotLoaded
//   - release() of an unknown or already-released chunk is a no-op
//   - at most `capacity` chunks stay resident (0 = unbounded);
//     the least recently used unpinned chunk is evicted first
//   - pinned chunks (those feeding the batch being assembled) are
//     never evicted; if everything resident is pinned the set is
//     allowed to grow past capacity until the batch ends
//
// Buffers are shared through Arc, so evicting a chunk only drops
// the store's handle. Anything already returned to a caller stays
// valid for as long as the caller holds it.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::domain::error::Result;
use crate::domain::tensor::DecodedSample;

/// Lifecycle state of one chunk id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    NotLoaded,
    Loaded,
    Released,
}

/// Running counters, mostly for logging and metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkStats {
    /// Chunks decoded and made resident
    pub loads: u64,
    /// require() calls served without decoding
    pub hits: u64,
    /// Chunks dropped to honour the capacity bound
    pub evictions: u64,
    /// Chunks dropped by an explicit release()
    pub releases: u64,
}

#[derive(Debug)]
struct Chunk {
    samples:   HashMap<usize, DecodedSample>,
    last_used: u64,
}

#[derive(Debug)]
pub struct ChunkStore {
    capacity:        usize,
    resident:        HashMap<usize, Chunk>,
    released:        HashSet<usize>,
    pinned:          HashSet<usize>,
    clock:           u64,
    stats:           ChunkStats,
    overflow_warned: bool,
}

impl ChunkStore {
    /// Store keeping at most `capacity` chunks resident (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            resident: HashMap::new(),
            released: HashSet::new(),
            pinned: HashSet::new(),
            clock: 0,
            stats: ChunkStats::default(),
            overflow_warned: false,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> ChunkStats {
        self.stats
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    /// Ids of resident chunks, ascending.
    pub fn resident_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.resident.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn state(&self, chunk_id: usize) -> ChunkState {
        if self.resident.contains_key(&chunk_id) {
            ChunkState::Loaded
        } else if self.released.contains(&chunk_id) {
            ChunkState::Released
        } else {
            ChunkState::NotLoaded
        }
    }

    pub fn is_loaded(&self, chunk_id: usize) -> bool {
        self.resident.contains_key(&chunk_id)
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Make `chunk_id` resident, decoding each of `members` with `decode`.
    ///
    /// Returns true if the chunk was newly loaded, false if it was
    /// already resident. On a decode error nothing is inserted.
    pub fn require<I, F>(&mut self, chunk_id: usize, members: I, mut decode: F) -> Result<bool>
    where
        I: IntoIterator<Item = usize>,
        F: FnMut(usize) -> Result<DecodedSample>,
    {
        let now = self.tick();
        if let Some(chunk) = self.resident.get_mut(&chunk_id) {
            chunk.last_used = now;
            self.stats.hits += 1;
            return Ok(false);
        }

        let samples = members
            .into_iter()
            .map(|sequence_id| decode(sequence_id).map(|sample| (sequence_id, sample)))
            .collect::<Result<HashMap<_, _>>>()?;

        tracing::debug!("Loaded chunk {} ({} sequences)", chunk_id, samples.len());

        self.resident.insert(chunk_id, Chunk { samples, last_used: now });
        self.released.remove(&chunk_id);
        self.stats.loads += 1;

        self.evict_over_capacity(Some(chunk_id));
        Ok(true)
    }

    /// Drop the store's buffers for `chunk_id`. Idempotent.
    /// Returns whether anything was resident.
    pub fn release(&mut self, chunk_id: usize) -> bool {
        self.pinned.remove(&chunk_id);
        match self.resident.remove(&chunk_id) {
            Some(_) => {
                self.released.insert(chunk_id);
                self.stats.releases += 1;
                tracing::debug!("Released chunk {}", chunk_id);
                true
            }
            None => false,
        }
    }

    /// Shared handle to one decoded sample of a resident chunk.
    pub fn sample(&mut self, chunk_id: usize, sequence_id: usize) -> Option<DecodedSample> {
        let now = self.tick();
        let chunk = self.resident.get_mut(&chunk_id)?;
        chunk.last_used = now;
        chunk.samples.get(&sequence_id).cloned()
    }

    /// Protect `chunk_id` from eviction until end_batch().
    pub fn pin(&mut self, chunk_id: usize) {
        self.pinned.insert(chunk_id);
    }

    pub fn is_pinned(&self, chunk_id: usize) -> bool {
        self.pinned.contains(&chunk_id)
    }

    /// Unpin everything and bring the resident set back under capacity.
    pub fn end_batch(&mut self) {
        self.pinned.clear();
        self.overflow_warned = false;
        self.evict_over_capacity(None);
    }

    fn evict_over_capacity(&mut self, keep: Option<usize>) {
        if self.capacity == 0 {
            return;
        }

        while self.resident.len() > self.capacity {
            let victim = self
                .resident
                .iter()
                .filter(|(id, _)| !self.pinned.contains(*id) && Some(**id) != keep)
                .min_by_key(|(_, chunk)| chunk.last_used)
                .map(|(id, _)| *id);

            match victim {
                Some(id) => {
                    self.resident.remove(&id);
                    self.released.insert(id);
                    self.stats.evictions += 1;
                    tracing::debug!("Evicted chunk {} (capacity {})", id, self.capacity);
                }
                None => {
                    if !self.overflow_warned {
                        tracing::warn!(
                            "All {} resident chunks are pinned; exceeding capacity {} until the batch ends",
                            self.resident.len(),
                            self.capacity
                        );
                        self.overflow_warned = true;
                    }
                    break;
                }
            }
        }
    }
}
