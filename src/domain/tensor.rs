// ============================================================
// Layer 3 — Tensor Buffers and Layouts
// ============================================================
// The typed values that flow out of the pipeline.
//
// Canonical layout:
//   Every decoded sample is described as (width, height, channels)
//   and stored densely with channel varying fastest, then width,
//   then height:
//
//     index(x, y, c) = (y * width + x) * channels + c
//
//   Decoders whose source uses a different storage order must
//   permute into this order before returning.
//
// Ownership:
//   Sequence data is handed out as Arc<TensorBuffer>. The chunk
//   store keeps its own handle while the chunk is resident; once
//   a chunk is released only the caller's handles keep the buffer
//   alive, so nothing the caller holds is ever freed under it.
//
// Reference: Rust Book §6 (Enums), §15 (Rc<T> / Arc<T>)

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;

// ─── ElementType ──────────────────────────────────────────────────────────────
/// Numeric width of produced feature and label elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Float32,
    Float64,
}

impl ElementType {
    /// Size in bytes of one element.
    pub fn width(&self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    /// Parse a configured type id, returning None for unsupported ids.
    ///
    /// Accepts the common spellings: float / f32 / float32 and
    /// double / f64 / float64 (case-insensitive).
    pub fn from_type_id(type_id: &str) -> Option<Self> {
        match type_id.trim().to_ascii_lowercase().as_str() {
            "float" | "f32" | "float32" => Some(Self::Float32),
            "double" | "f64" | "float64" => Some(Self::Float64),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float32 => f.write_str("float32"),
            Self::Float64 => f.write_str("float64"),
        }
    }
}

impl FromStr for ElementType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_type_id(s)
            .ok_or_else(|| PipelineError::invalid(format!("unsupported element type '{s}'")))
    }
}

// ─── TensorBuffer ─────────────────────────────────────────────────────────────
/// A dense, contiguous buffer of 32- or 64-bit floats.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorBuffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl TensorBuffer {
    /// Widen raw 8-bit samples without rescaling.
    pub fn from_u8(raw: &[u8], element_type: ElementType) -> Self {
        match element_type {
            ElementType::Float32 => Self::F32(raw.iter().map(|&v| f32::from(v)).collect()),
            ElementType::Float64 => Self::F64(raw.iter().map(|&v| f64::from(v)).collect()),
        }
    }

    /// Widen raw 16-bit samples without rescaling.
    pub fn from_u16(raw: &[u16], element_type: ElementType) -> Self {
        match element_type {
            ElementType::Float32 => Self::F32(raw.iter().map(|&v| f32::from(v)).collect()),
            ElementType::Float64 => Self::F64(raw.iter().map(|&v| f64::from(v)).collect()),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Self::F32(_) => ElementType::Float32,
            Self::F64(_) => ElementType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len() * self.element_type().width()
    }

    /// Convert to `target`, consuming self. Returns the buffer untouched
    /// when it is already of the target type, so no second pass is made.
    pub fn into_element_type(self, target: ElementType) -> Self {
        match (self, target) {
            (Self::F32(v), ElementType::Float64) => Self::F64(v.into_iter().map(f64::from).collect()),
            (Self::F64(v), ElementType::Float32) => Self::F32(v.into_iter().map(|x| x as f32).collect()),
            (same, _) => same,
        }
    }

    /// Read one element as f64 regardless of storage width.
    pub fn get(&self, index: usize) -> Option<f64> {
        match self {
            Self::F32(v) => v.get(index).map(|&x| f64::from(x)),
            Self::F64(v) => v.get(index).copied(),
        }
    }

    /// Copy the contents out as f32 (used when stacking batches).
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            Self::F32(v) => v.clone(),
            Self::F64(v) => v.iter().map(|&x| x as f32).collect(),
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::F32(v) => Some(v),
            Self::F64(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Self::F64(v) => Some(v),
            Self::F32(_) => None,
        }
    }
}

// ─── SampleLayout ─────────────────────────────────────────────────────────────
/// Shape descriptor in canonical (width, height, channels) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleLayout {
    pub width:    usize,
    pub height:   usize,
    pub channels: usize,
}

impl SampleLayout {
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self { width, height, channels }
    }

    /// Layout of a label vector: a single column of `dimension` rows.
    pub fn vector(dimension: usize) -> Self {
        Self::new(1, dimension, 1)
    }

    /// Number of elements a buffer with this layout holds.
    pub fn element_count(&self) -> usize {
        self.width * self.height * self.channels
    }

    /// Flat index of (x, y, c) in the canonical storage order.
    pub fn index(&self, x: usize, y: usize, c: usize) -> usize {
        (y * self.width + x) * self.channels + c
    }
}

impl fmt::Display for SampleLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

// ─── DecodedSample ────────────────────────────────────────────────────────────
/// What a decoder produces: canonical data plus its layout.
#[derive(Debug, Clone)]
pub struct DecodedSample {
    pub data:   Arc<TensorBuffer>,
    pub layout: SampleLayout,
}

impl DecodedSample {
    pub fn new(data: TensorBuffer, layout: SampleLayout) -> Self {
        Self {
            data: Arc::new(data),
            layout,
        }
    }
}

// ─── Sequence / SequencePair ──────────────────────────────────────────────────
/// One output stream entry handed to the training loop.
#[derive(Debug, Clone)]
pub struct Sequence {
    /// Caller-owned handle; stays valid until the caller drops it
    pub data: Arc<TensorBuffer>,

    pub layout: SampleLayout,

    pub number_of_samples: usize,
}

/// The (feature, label) pair returned for one requested id.
#[derive(Debug, Clone)]
pub struct SequencePair {
    pub id:       usize,
    pub features: Sequence,
    pub label:    Sequence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ids() {
        assert_eq!(ElementType::from_type_id("float"), Some(ElementType::Float32));
        assert_eq!(ElementType::from_type_id("F64"), Some(ElementType::Float64));
        assert_eq!(ElementType::from_type_id("double"), Some(ElementType::Float64));
        assert_eq!(ElementType::from_type_id("half"), None);
        assert!("int8".parse::<ElementType>().is_err());
    }

    #[test]
    fn test_conversion_is_skipped_when_types_match() {
        let buf = TensorBuffer::F32(vec![1.0, 2.0]);
        let same = buf.clone().into_element_type(ElementType::Float32);
        assert_eq!(same, buf);

        let wide = buf.into_element_type(ElementType::Float64);
        assert_eq!(wide, TensorBuffer::F64(vec![1.0, 2.0]));
    }

    #[test]
    fn test_u8_widening_keeps_raw_values() {
        let buf = TensorBuffer::from_u8(&[0, 128, 255], ElementType::Float64);
        assert_eq!(buf.as_f64(), Some(&[0.0, 128.0, 255.0][..]));
        assert_eq!(buf.byte_len(), 24);
    }

    #[test]
    fn test_canonical_index() {
        let layout = SampleLayout::new(4, 2, 3);
        assert_eq!(layout.element_count(), 24);
        assert_eq!(layout.index(0, 0, 0), 0);
        assert_eq!(layout.index(1, 0, 2), 5);
        assert_eq!(layout.index(0, 1, 0), 12);
    }
}
