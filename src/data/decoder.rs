// ============================================================
// Layer 4 — Sample Decoders
// ============================================================
// Turns a record's bytes into a canonical tensor.
//
// Every decoder must hand back:
//   - a contiguous buffer, channel fastest, then width, then
//     height (see domain::tensor)
//   - a (width, height, channels) layout descriptor
//   - elements of exactly the requested float width
//
// Supported sources:
//
//   ImageDecoder → anything the `image` crate reads. Pixels come
//                  out row-major and interleaved, which already is
//                  the canonical order. 8/16-bit samples are
//                  widened without rescaling (255 stays 255.0).
//
//   DenseDecoder → pre-extracted tensors in the "DSMP" binary
//                  format, stored in HWC, CHW or WHC order. Non
//                  canonical orders are permuted on load.
//
//   AutoDecoder  → reads the file once, sniffs the magic bytes
//                  and hands the buffer to one of the above.
//
// DSMP layout (little-endian):
//
//   offset  size  field
//   0       4     magic "DSMP"
//   4       1     version (1)
//   5       1     element kind   0=u8 1=f32 2=f64
//   6       1     storage order  0=HWC 1=CHW 2=WHC
//   7       1     reserved (0)
//   8       4     width
//   12      4     height
//   16      4     channels
//   20      ...   payload, width*height*channels elements
//
// Reference: image crate documentation
//            byteorder crate documentation

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, Result};
use crate::domain::tensor::{DecodedSample, ElementType, SampleLayout, TensorBuffer};
use crate::domain::traits::SampleDecoder;

pub const DENSE_MAGIC: &[u8; 4] = b"DSMP";
const DENSE_VERSION: u8 = 1;
const DENSE_HEADER_LEN: usize = 20;

fn read_source(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| PipelineError::decode(path, format!("cannot read file: {e}")))
}

// ─── ColorMode ────────────────────────────────────────────────────────────────
/// Channel handling for image sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Always three channels
    #[default]
    Rgb,
    /// Single luminance channel
    Gray,
    /// Keep the file's own channel count and bit depth
    Native,
}

#[derive(Clone, Copy)]
enum Depth {
    U8,
    U16,
    F32,
}

fn sample_depth(img: &DynamicImage) -> Depth {
    match img {
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => Depth::U16,
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => Depth::F32,
        _ => Depth::U8,
    }
}

// ─── ImageDecoder ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct ImageDecoder {
    color: ColorMode,
}

impl ImageDecoder {
    pub fn new(color: ColorMode) -> Self {
        Self { color }
    }

    pub fn decode_bytes(&self, path: &Path, bytes: &[u8], target: ElementType) -> Result<DecodedSample> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| PipelineError::decode(path, format!("image decode failed: {e}")))?;

        let (width, height) = (img.width() as usize, img.height() as usize);
        let (data, channels) = self.pixels(img, target);
        let layout = SampleLayout::new(width, height, channels);

        if data.len() != layout.element_count() {
            return Err(PipelineError::decode(
                path,
                format!("decoded {} elements, layout {layout} needs {}", data.len(), layout.element_count()),
            ));
        }

        Ok(DecodedSample::new(data, layout))
    }

    fn pixels(&self, img: DynamicImage, target: ElementType) -> (TensorBuffer, usize) {
        let depth = sample_depth(&img);

        match self.color {
            ColorMode::Rgb => match depth {
                Depth::F32 => (TensorBuffer::F32(img.into_rgb32f().into_raw()).into_element_type(target), 3),
                Depth::U16 => (TensorBuffer::from_u16(&img.into_rgb16().into_raw(), target), 3),
                Depth::U8 => (TensorBuffer::from_u8(&img.into_rgb8().into_raw(), target), 3),
            },
            // Float sources are quantised to 16 bit here; the image
            // crate has no float luminance buffer.
            ColorMode::Gray => match depth {
                Depth::U8 => (TensorBuffer::from_u8(&img.into_luma8().into_raw(), target), 1),
                Depth::U16 | Depth::F32 => (TensorBuffer::from_u16(&img.into_luma16().into_raw(), target), 1),
            },
            ColorMode::Native => native_pixels(img, depth, target),
        }
    }
}

fn native_pixels(img: DynamicImage, depth: Depth, target: ElementType) -> (TensorBuffer, usize) {
    let channels = usize::from(img.color().channel_count());

    // Channel counts without a dedicated buffer type fall back to RGB
    match (depth, channels) {
        (Depth::F32, 4) => (TensorBuffer::F32(img.into_rgba32f().into_raw()).into_element_type(target), 4),
        (Depth::F32, _) => (TensorBuffer::F32(img.into_rgb32f().into_raw()).into_element_type(target), 3),
        (Depth::U16, 1) => (TensorBuffer::from_u16(&img.into_luma16().into_raw(), target), 1),
        (Depth::U16, 2) => (TensorBuffer::from_u16(&img.into_luma_alpha16().into_raw(), target), 2),
        (Depth::U16, 4) => (TensorBuffer::from_u16(&img.into_rgba16().into_raw(), target), 4),
        (Depth::U16, _) => (TensorBuffer::from_u16(&img.into_rgb16().into_raw(), target), 3),
        (Depth::U8, 1) => (TensorBuffer::from_u8(&img.into_luma8().into_raw(), target), 1),
        (Depth::U8, 2) => (TensorBuffer::from_u8(&img.into_luma_alpha8().into_raw(), target), 2),
        (Depth::U8, 4) => (TensorBuffer::from_u8(&img.into_rgba8().into_raw(), target), 4),
        (Depth::U8, _) => (TensorBuffer::from_u8(&img.into_rgb8().into_raw(), target), 3),
    }
}

impl SampleDecoder for ImageDecoder {
    fn decode(&self, path: &Path, target: ElementType) -> Result<DecodedSample> {
        let bytes = read_source(path)?;
        self.decode_bytes(path, &bytes, target)
    }

    fn name(&self) -> &'static str {
        "image"
    }
}

// ─── StorageOrder ─────────────────────────────────────────────────────────────
/// Order in which a dense source stores its elements, slowest axis first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageOrder {
    /// height, width, channel (canonical)
    Hwc,
    /// channel planes of height × width
    Chw,
    /// width, height, channel, i.e. column-major images
    Whc,
}

impl StorageOrder {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Hwc),
            1 => Some(Self::Chw),
            2 => Some(Self::Whc),
            _ => None,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Hwc => 0,
            Self::Chw => 1,
            Self::Whc => 2,
        }
    }

    /// Flat index of (x, y, c) in a buffer stored in this order.
    fn source_index(&self, layout: &SampleLayout, x: usize, y: usize, c: usize) -> usize {
        let SampleLayout { width, height, channels } = *layout;
        match self {
            Self::Hwc => (y * width + x) * channels + c,
            Self::Chw => (c * height + y) * width + x,
            Self::Whc => (x * height + y) * channels + c,
        }
    }
}

/// Permute `src` from `order` into canonical HWC order.
pub fn canonicalize<T: Copy>(src: Vec<T>, order: StorageOrder, layout: &SampleLayout) -> Vec<T> {
    if order == StorageOrder::Hwc {
        return src;
    }

    let mut dst = Vec::with_capacity(src.len());
    for y in 0..layout.height {
        for x in 0..layout.width {
            for c in 0..layout.channels {
                dst.push(src[order.source_index(layout, x, y, c)]);
            }
        }
    }
    dst
}

// ─── Dense payloads ───────────────────────────────────────────────────────────
/// Borrowed element data for writing a dense sample.
#[derive(Debug, Clone, Copy)]
pub enum DensePayload<'a> {
    U8(&'a [u8]),
    F32(&'a [f32]),
    F64(&'a [f64]),
}

impl DensePayload<'_> {
    fn kind(&self) -> u8 {
        match self {
            Self::U8(_) => 0,
            Self::F32(_) => 1,
            Self::F64(_) => 2,
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }
}

/// Serialise a dense sample into DSMP bytes.
pub fn encode_dense_sample(layout: SampleLayout, order: StorageOrder, payload: DensePayload<'_>) -> std::io::Result<Vec<u8>> {
    if payload.len() != layout.element_count() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("payload has {} elements, layout {layout} needs {}", payload.len(), layout.element_count()),
        ));
    }

    let dim = |v: usize| {
        u32::try_from(v).map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "dimension exceeds u32"))
    };

    let mut out = Vec::with_capacity(DENSE_HEADER_LEN + payload.len() * 8);
    out.write_all(DENSE_MAGIC)?;
    out.write_u8(DENSE_VERSION)?;
    out.write_u8(payload.kind())?;
    out.write_u8(order.tag())?;
    out.write_u8(0)?;
    out.write_u32::<LittleEndian>(dim(layout.width)?)?;
    out.write_u32::<LittleEndian>(dim(layout.height)?)?;
    out.write_u32::<LittleEndian>(dim(layout.channels)?)?;

    match payload {
        DensePayload::U8(v) => out.write_all(v)?,
        DensePayload::F32(v) => {
            for &x in v {
                out.write_f32::<LittleEndian>(x)?;
            }
        }
        DensePayload::F64(v) => {
            for &x in v {
                out.write_f64::<LittleEndian>(x)?;
            }
        }
    }

    Ok(out)
}

/// Write a dense sample file.
pub fn write_dense_sample(
    path:    impl AsRef<Path>,
    layout:  SampleLayout,
    order:   StorageOrder,
    payload: DensePayload<'_>,
) -> std::io::Result<()> {
    fs::write(path, encode_dense_sample(layout, order, payload)?)
}

// ─── DenseDecoder ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseDecoder;

impl DenseDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode_bytes(&self, path: &Path, bytes: &[u8], target: ElementType) -> Result<DecodedSample> {
        let err = |reason: String| PipelineError::decode(path, reason);
        let io_err = |e: std::io::Error| PipelineError::decode(path, format!("truncated dense sample: {e}"));

        let mut rdr = Cursor::new(bytes);

        let mut magic = [0u8; 4];
        rdr.read_exact(&mut magic).map_err(io_err)?;
        if &magic != DENSE_MAGIC {
            return Err(err("missing DSMP magic".to_string()));
        }

        let version = rdr.read_u8().map_err(io_err)?;
        if version != DENSE_VERSION {
            return Err(err(format!("unsupported dense sample version {version}")));
        }

        let kind = rdr.read_u8().map_err(io_err)?;
        let order_tag = rdr.read_u8().map_err(io_err)?;
        let order = StorageOrder::from_tag(order_tag)
            .ok_or_else(|| err(format!("unknown storage order tag {order_tag}")))?;
        let _reserved = rdr.read_u8().map_err(io_err)?;

        let width = rdr.read_u32::<LittleEndian>().map_err(io_err)? as usize;
        let height = rdr.read_u32::<LittleEndian>().map_err(io_err)? as usize;
        let channels = rdr.read_u32::<LittleEndian>().map_err(io_err)? as usize;
        let layout = SampleLayout::new(width, height, channels);

        let count = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .ok_or_else(|| err(format!("layout {layout} overflows")))?;
        if count == 0 {
            return Err(err(format!("empty layout {layout}")));
        }

        let element_size = match kind {
            0 => 1,
            1 => 4,
            2 => 8,
            other => return Err(err(format!("unknown element kind {other}"))),
        };
        let needed = count
            .checked_mul(element_size)
            .ok_or_else(|| err(format!("layout {layout} overflows")))?;
        let payload_len = bytes.len() - DENSE_HEADER_LEN;
        if payload_len != needed {
            return Err(err(format!("payload is {payload_len} bytes, layout {layout} needs {needed}")));
        }

        // Permute at the native width, then convert only if the
        // stored width differs from the target.
        let data = match kind {
            0 => {
                let raw = canonicalize(bytes[DENSE_HEADER_LEN..].to_vec(), order, &layout);
                TensorBuffer::from_u8(&raw, target)
            }
            1 => {
                let mut raw = vec![0f32; count];
                rdr.read_f32_into::<LittleEndian>(&mut raw).map_err(io_err)?;
                TensorBuffer::F32(canonicalize(raw, order, &layout)).into_element_type(target)
            }
            _ => {
                let mut raw = vec![0f64; count];
                rdr.read_f64_into::<LittleEndian>(&mut raw).map_err(io_err)?;
                TensorBuffer::F64(canonicalize(raw, order, &layout)).into_element_type(target)
            }
        };

        Ok(DecodedSample::new(data, layout))
    }
}

impl SampleDecoder for DenseDecoder {
    fn decode(&self, path: &Path, target: ElementType) -> Result<DecodedSample> {
        let bytes = read_source(path)?;
        self.decode_bytes(path, &bytes, target)
    }

    fn name(&self) -> &'static str {
        "dense"
    }
}

// ─── AutoDecoder ──────────────────────────────────────────────────────────────
/// Picks the decoder from the file's leading bytes.
#[derive(Debug, Clone, Default)]
pub struct AutoDecoder {
    image: ImageDecoder,
    dense: DenseDecoder,
}

impl AutoDecoder {
    pub fn new(color: ColorMode) -> Self {
        Self {
            image: ImageDecoder::new(color),
            dense: DenseDecoder::new(),
        }
    }
}

impl SampleDecoder for AutoDecoder {
    fn decode(&self, path: &Path, target: ElementType) -> Result<DecodedSample> {
        let bytes = read_source(path)?;
        if bytes.starts_with(DENSE_MAGIC) {
            self.dense.decode_bytes(path, &bytes, target)
        } else {
            self.image.decode_bytes(path, &bytes, target)
        }
    }

    fn name(&self) -> &'static str {
        "auto"
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// 3 wide, 2 high, 2 channels, value = 100*y + 10*x + c
    fn reference_pixels() -> (SampleLayout, Vec<u8>) {
        let layout = SampleLayout::new(3, 2, 2);
        let mut hwc = Vec::new();
        for y in 0..2u8 {
            for x in 0..3u8 {
                for c in 0..2u8 {
                    hwc.push(100 * y + 10 * x + c);
                }
            }
        }
        (layout, hwc)
    }

    fn reorder(hwc: &[u8], layout: &SampleLayout, order: StorageOrder) -> Vec<u8> {
        let mut out = vec![0u8; hwc.len()];
        for y in 0..layout.height {
            for x in 0..layout.width {
                for c in 0..layout.channels {
                    out[order.source_index(layout, x, y, c)] = hwc[layout.index(x, y, c)];
                }
            }
        }
        out
    }

    #[test]
    fn test_layout_is_canonical_for_every_storage_order() {
        let dir = tempdir().unwrap();
        let (layout, hwc) = reference_pixels();
        let expected = TensorBuffer::from_u8(&hwc, ElementType::Float32);

        for order in [StorageOrder::Hwc, StorageOrder::Chw, StorageOrder::Whc] {
            let path = dir.path().join(format!("{order:?}.dsmp"));
            let stored = reorder(&hwc, &layout, order);
            write_dense_sample(&path, layout, order, DensePayload::U8(&stored)).unwrap();

            let sample = DenseDecoder::new().decode(&path, ElementType::Float32).unwrap();
            assert_eq!(sample.layout, SampleLayout::new(3, 2, 2), "{order:?}");
            assert_eq!(*sample.data, expected, "{order:?}");
        }
    }

    #[test]
    fn test_dense_precision_follows_target() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f64.dsmp");
        let layout = SampleLayout::new(2, 1, 1);
        write_dense_sample(&path, layout, StorageOrder::Hwc, DensePayload::F64(&[0.5, 1.5])).unwrap();

        let same = DenseDecoder::new().decode(&path, ElementType::Float64).unwrap();
        assert_eq!(*same.data, TensorBuffer::F64(vec![0.5, 1.5]));

        let narrowed = DenseDecoder::new().decode(&path, ElementType::Float32).unwrap();
        assert_eq!(*narrowed.data, TensorBuffer::F32(vec![0.5, 1.5]));
    }

    #[test]
    fn test_dense_rejects_short_payload() {
        let layout = SampleLayout::new(2, 2, 1);
        let mut bytes = encode_dense_sample(layout, StorageOrder::Hwc, DensePayload::U8(&[1, 2, 3, 4])).unwrap();
        bytes.pop();
        let err = DenseDecoder::new()
            .decode_bytes(Path::new("short.dsmp"), &bytes, ElementType::Float32)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_dense_rejects_overflowing_layout() {
        // Dimensions whose element count fits usize but whose f64 byte size does not
        let mut bytes = Vec::new();
        bytes.write_all(DENSE_MAGIC).unwrap();
        bytes.write_u8(DENSE_VERSION).unwrap();
        bytes.write_u8(2).unwrap();
        bytes.write_u8(StorageOrder::Hwc.tag()).unwrap();
        bytes.write_u8(0).unwrap();
        for dim in [1u32 << 16, 1 << 16, 1 << 31] {
            bytes.write_u32::<LittleEndian>(dim).unwrap();
        }
        assert_eq!(bytes.len(), DENSE_HEADER_LEN);

        let err = DenseDecoder::new()
            .decode_bytes(Path::new("huge.dsmp"), &bytes, ElementType::Float64)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_image_decoder_reads_png_as_hwc() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        // 2 wide, 1 high: red then blue
        let img = image::RgbImage::from_raw(2, 1, vec![255, 0, 0, 0, 0, 255]).unwrap();
        img.save(&path).unwrap();

        let sample = ImageDecoder::default().decode(&path, ElementType::Float64).unwrap();
        assert_eq!(sample.layout, SampleLayout::new(2, 1, 3));
        assert_eq!(*sample.data, TensorBuffer::F64(vec![255.0, 0.0, 0.0, 0.0, 0.0, 255.0]));
    }

    #[test]
    fn test_portrait_and_landscape_share_descriptor_order() {
        let dir = tempdir().unwrap();
        let wide = dir.path().join("wide.png");
        let tall = dir.path().join("tall.png");
        image::GrayImage::new(4, 2).save(&wide).unwrap();
        image::GrayImage::new(2, 4).save(&tall).unwrap();

        let dec = ImageDecoder::new(ColorMode::Gray);
        let a = dec.decode(&wide, ElementType::Float32).unwrap();
        let b = dec.decode(&tall, ElementType::Float32).unwrap();
        assert_eq!(a.layout, SampleLayout::new(4, 2, 1));
        assert_eq!(b.layout, SampleLayout::new(2, 4, 1));
    }

    #[test]
    fn test_native_mode_keeps_alpha() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alpha.png");
        image::RgbaImage::new(1, 1).save(&path).unwrap();

        let sample = ImageDecoder::new(ColorMode::Native).decode(&path, ElementType::Float32).unwrap();
        assert_eq!(sample.layout.channels, 4);
        assert_eq!(sample.data.len(), 4);
    }

    #[test]
    fn test_auto_decoder_dispatches_on_magic() {
        let dir = tempdir().unwrap();
        let dense = dir.path().join("x.bin");
        let png = dir.path().join("y.png");
        write_dense_sample(&dense, SampleLayout::new(1, 1, 1), StorageOrder::Hwc, DensePayload::F32(&[7.0])).unwrap();
        image::RgbImage::new(1, 1).save(&png).unwrap();

        let auto = AutoDecoder::default();
        assert_eq!(auto.decode(&dense, ElementType::Float32).unwrap().layout.channels, 1);
        assert_eq!(auto.decode(&png, ElementType::Float32).unwrap().layout.channels, 3);
    }

    #[test]
    fn test_garbage_and_missing_files_are_decode_errors() {
        let dir = tempdir().unwrap();
        let junk = dir.path().join("junk.png");
        fs::write(&junk, b"not an image").unwrap();

        let auto = AutoDecoder::default();
        assert!(matches!(auto.decode(&junk, ElementType::Float32), Err(PipelineError::Decode { .. })));
        assert!(matches!(
            auto.decode(&dir.path().join("absent.png"), ElementType::Float32),
            Err(PipelineError::Decode { .. })
        ));
    }
}
