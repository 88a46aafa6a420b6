// ============================================================
// Layer 4 — Sequence Batcher
// ============================================================
// Stacks a minibatch of SequencePairs into Burn tensors so a
// training step can consume them directly.
//
//   Input:  N pairs, features H×W×C, labels D
//   Output: features [N, H, W, C], labels [N, D]
//
// Each feature buffer is already in canonical order
// ((y * W + x) * C + c), which is exactly row-major [H, W, C],
// so stacking is a plain concatenation.
//
// Every pair must share one feature layout and one label layout.
// Datasets with mixed image sizes cannot be stacked; the caller
// decides whether to skip or to fail.
//
// Reference: Burn Book §4 (Batcher)

use burn::tensor::{backend::Backend, Tensor, TensorData};

use crate::domain::error::{PipelineError, Result};
use crate::domain::tensor::{SampleLayout, SequencePair};

// ─── SequenceBatch ────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SequenceBatch<B: Backend> {
    /// Sequence ids, row order of both tensors
    pub ids: Vec<usize>,

    /// shape: [batch, height, width, channels]
    pub features: Tensor<B, 4>,

    /// shape: [batch, label_dimension]
    pub labels: Tensor<B, 2>,
}

// ─── SequenceBatcher ──────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct SequenceBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SequenceBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// True when `pairs` is non-empty and every pair shares the
    /// first pair's feature and label layouts.
    pub fn is_stackable(pairs: &[SequencePair]) -> bool {
        uniform_layouts(pairs).is_ok()
    }

    pub fn batch(&self, pairs: &[SequencePair]) -> Result<SequenceBatch<B>> {
        let (features_layout, label_layout) = uniform_layouts(pairs)?;
        let n = pairs.len();

        let features_flat: Vec<f32> = pairs
            .iter()
            .flat_map(|p| p.features.data.to_f32_vec())
            .collect();
        let labels_flat: Vec<f32> = pairs
            .iter()
            .flat_map(|p| p.label.data.to_f32_vec())
            .collect();

        let features = Tensor::<B, 4>::from_data(
            TensorData::new(
                features_flat,
                [n, features_layout.height, features_layout.width, features_layout.channels],
            ),
            &self.device,
        );
        let labels = Tensor::<B, 2>::from_data(
            TensorData::new(labels_flat, [n, label_layout.element_count()]),
            &self.device,
        );

        Ok(SequenceBatch {
            ids: pairs.iter().map(|p| p.id).collect(),
            features,
            labels,
        })
    }
}

fn uniform_layouts(pairs: &[SequencePair]) -> Result<(SampleLayout, SampleLayout)> {
    let first = pairs
        .first()
        .ok_or_else(|| PipelineError::invalid("cannot batch an empty minibatch"))?;
    let features = first.features.layout;
    let label = first.label.layout;

    for p in pairs {
        if p.features.layout != features {
            return Err(PipelineError::invalid(format!(
                "sequence {} has layout {}, batch expects {}",
                p.id, p.features.layout, features
            )));
        }
        if p.label.layout != label {
            return Err(PipelineError::invalid(format!(
                "sequence {} has label layout {}, batch expects {}",
                p.id, p.label.layout, label
            )));
        }
    }
    Ok((features, label))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tensor::{Sequence, TensorBuffer};
    use burn::backend::NdArray;
    use std::sync::Arc;

    type TestBackend = NdArray;

    fn pair(id: usize, layout: SampleLayout, fill: f32, class_id: usize) -> SequencePair {
        let mut label = vec![0.0f32; 3];
        label[class_id] = 1.0;
        SequencePair {
            id,
            features: Sequence {
                data: Arc::new(TensorBuffer::F32(vec![fill; layout.element_count()])),
                layout,
                number_of_samples: 1,
            },
            label: Sequence {
                data: Arc::new(TensorBuffer::F64(label.iter().map(|&v| v as f64).collect())),
                layout: SampleLayout::vector(3),
                number_of_samples: 1,
            },
        }
    }

    fn batcher() -> SequenceBatcher<TestBackend> {
        SequenceBatcher::new(Default::default())
    }

    #[test]
    fn test_batch_shapes() {
        let layout = SampleLayout::new(4, 2, 3);
        let pairs = vec![pair(5, layout, 1.0, 0), pair(9, layout, 2.0, 2)];

        let batch = batcher().batch(&pairs).unwrap();
        assert_eq!(batch.ids, vec![5, 9]);
        assert_eq!(batch.features.dims(), [2, 2, 4, 3]);
        assert_eq!(batch.labels.dims(), [2, 3]);
    }

    #[test]
    fn test_label_rows_keep_pair_order() {
        let layout = SampleLayout::new(1, 1, 1);
        let pairs = vec![pair(0, layout, 0.0, 2), pair(1, layout, 0.0, 0)];

        let labels = batcher().batch(&pairs).unwrap().labels.into_data();
        let values = labels.to_vec::<f32>().unwrap();
        assert_eq!(values, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        assert!(matches!(
            batcher().batch(&[]),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_mixed_layouts_are_rejected() {
        let pairs = vec![
            pair(0, SampleLayout::new(2, 2, 3), 0.0, 0),
            pair(1, SampleLayout::new(2, 3, 3), 0.0, 0),
        ];
        assert!(!SequenceBatcher::<TestBackend>::is_stackable(&pairs));
        assert!(batcher().batch(&pairs).is_err());
    }
}
