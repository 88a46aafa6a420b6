// ============================================================
// Layer 4 — Epoch Sampler
// ============================================================
// Decides which sequence ids each minibatch of an epoch asks for.
// The deserializer never decides this; it answers whatever ids
// it is given.
//
//   describe_all() ─▶ valid ids ─▶ shuffle (seeded) ─▶ truncate
//                                                       │
//                                                       ▼
//                                           [ids..][ids..][ids..]
//
// Shuffling uses Fisher-Yates via rand::seq::SliceRandom over a
// StdRng seeded with `seed + epoch`, so every epoch gets a
// different order and the same seed replays the same run.
// Without a seed the catalog order is kept.
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::record::SequenceDescription;

/// Per-epoch settings handed to the deserializer and the sampler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochConfiguration {
    /// 1-based epoch counter
    pub epoch: usize,

    /// Sequences per get_sequences call (0 is treated as 1)
    pub minibatch_size: usize,

    /// Cap on sequences visited this epoch; None = all of them
    pub total_size: Option<usize>,

    /// Shuffle seed; None keeps catalog order
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct EpochSampler {
    ids: Vec<usize>,
}

impl EpochSampler {
    /// Collect the ids of every valid sequence.
    pub fn new<'a>(descriptions: impl IntoIterator<Item = &'a SequenceDescription>) -> Self {
        let ids = descriptions
            .into_iter()
            .filter(|d| d.is_valid)
            .map(|d| d.id)
            .collect();
        Self { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids visited in this epoch, in visiting order.
    pub fn epoch_order(&self, config: &EpochConfiguration) -> Vec<usize> {
        let mut order = self.ids.clone();

        if let Some(seed) = config.seed {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(config.epoch as u64));
            order.shuffle(&mut rng);
        }

        if let Some(total) = config.total_size {
            order.truncate(total);
        }
        order
    }

    /// The epoch order cut into minibatches. The last one may be short.
    pub fn minibatches(&self, config: &EpochConfiguration) -> Vec<Vec<usize>> {
        let size = config.minibatch_size.max(1);
        let batches: Vec<Vec<usize>> = self
            .epoch_order(config)
            .chunks(size)
            .map(|chunk| chunk.to_vec())
            .collect();

        tracing::debug!(
            "Epoch {}: {} minibatches of up to {} sequences",
            config.epoch,
            batches.len(),
            size
        );
        batches
    }
}
