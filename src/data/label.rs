// ============================================================
// Layer 4 — One-Hot Label Encoder
// ============================================================
// Produces the label vector for a class id:
//
//   label_dimension = 4, class_id = 2  →  [0, 0, 1, 0]
//
// The numeric width is chosen once, at construction, from the
// configured element type and then dispatched by matching on the
// variant.
//
// The encoder keeps one scratch buffer per instance and rewrites
// it on every call (zero everything, set one entry). encode()
// hands out a borrow of that buffer, so the compiler enforces
// that the view is dead before the next encode(). Callers who
// need the vector to outlive that use encode_owned().

use crate::domain::error::{PipelineError, Result};
use crate::domain::tensor::{ElementType, TensorBuffer};

/// Borrowed view of the encoder's scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelVector<'a> {
    F32(&'a [f32]),
    F64(&'a [f64]),
}

impl LabelVector<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the view into an owned buffer.
    pub fn to_buffer(&self) -> TensorBuffer {
        match self {
            Self::F32(v) => TensorBuffer::F32(v.to_vec()),
            Self::F64(v) => TensorBuffer::F64(v.to_vec()),
        }
    }
}

/// One-hot encoder, tagged by element width.
#[derive(Debug, Clone)]
pub enum LabelEncoder {
    Float32OneHot { scratch: Vec<f32> },
    Float64OneHot { scratch: Vec<f64> },
}

impl LabelEncoder {
    pub fn new(element_type: ElementType, dimension: usize) -> Self {
        match element_type {
            ElementType::Float32 => Self::Float32OneHot { scratch: vec![0.0; dimension] },
            ElementType::Float64 => Self::Float64OneHot { scratch: vec![0.0; dimension] },
        }
    }

    /// Select the variant from a configured type id such as "float" or "double".
    pub fn from_type_id(type_id: &str, dimension: usize) -> Result<Self> {
        let element_type = ElementType::from_type_id(type_id).ok_or_else(|| {
            PipelineError::UnsupportedLabelElementType { type_id: type_id.to_string() }
        })?;
        Ok(Self::new(element_type, dimension))
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Float32OneHot { .. } => ElementType::Float32,
            Self::Float64OneHot { .. } => ElementType::Float64,
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Self::Float32OneHot { scratch } => scratch.len(),
            Self::Float64OneHot { scratch } => scratch.len(),
        }
    }

    /// Encode `class_id` into the scratch buffer and return a view of it.
    /// The view is valid until the next call on this encoder.
    pub fn encode(&mut self, class_id: usize) -> Result<LabelVector<'_>> {
        let dimension = self.dimension();
        if class_id >= dimension {
            return Err(PipelineError::invalid(format!(
                "class id {class_id} does not fit label dimension {dimension}"
            )));
        }

        Ok(match self {
            Self::Float32OneHot { scratch } => {
                scratch.fill(0.0);
                scratch[class_id] = 1.0;
                LabelVector::F32(scratch.as_slice())
            }
            Self::Float64OneHot { scratch } => {
                scratch.fill(0.0);
                scratch[class_id] = 1.0;
                LabelVector::F64(scratch.as_slice())
            }
        })
    }

    /// Encode and copy out, for labels that must persist.
    pub fn encode_owned(&mut self, class_id: usize) -> Result<TensorBuffer> {
        Ok(self.encode(class_id)?.to_buffer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_class_round_trips() {
        for element_type in [ElementType::Float32, ElementType::Float64] {
            let mut enc = LabelEncoder::new(element_type, 5);
            for class_id in 0..5 {
                let buf = enc.encode_owned(class_id).unwrap();
                assert_eq!(buf.len(), 5);
                assert_eq!(buf.element_type(), element_type);
                for i in 0..5 {
                    let want = if i == class_id { 1.0 } else { 0.0 };
                    assert_eq!(buf.get(i), Some(want));
                }
            }
        }
    }

    #[test]
    fn test_scratch_is_rezeroed_between_calls() {
        let mut enc = LabelEncoder::new(ElementType::Float32, 3);
        enc.encode(0).unwrap();
        let view = enc.encode(2).unwrap();
        assert_eq!(view, LabelVector::F32(&[0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_type_id_selects_variant() {
        let enc = LabelEncoder::from_type_id("double", 2).unwrap();
        assert!(matches!(enc, LabelEncoder::Float64OneHot { .. }));
        let enc = LabelEncoder::from_type_id("float", 2).unwrap();
        assert_eq!(enc.element_type(), ElementType::Float32);
    }

    #[test]
    fn test_unknown_type_id_is_rejected() {
        let err = LabelEncoder::from_type_id("int16", 2).unwrap_err();
        match err {
            PipelineError::UnsupportedLabelElementType { type_id } => assert_eq!(type_id, "int16"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_out_of_range_class_is_an_error() {
        let mut enc = LabelEncoder::new(ElementType::Float64, 2);
        assert!(enc.encode(2).is_err());
    }
}
