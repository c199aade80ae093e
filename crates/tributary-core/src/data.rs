//! Typed, interleaved sample storage and the sample codecs.
//!
//! Decoding normalizes every representation to `f32` in [-1, 1):
//!
//! | Format | Decode | Encode (saturating) |
//! |--------|--------|---------------------|
//! | `Unsigned8` | `(v - 128) / 128` | `round(x * 128) + 128` |
//! | `Signed16` | `v / 32768` | `round(x * 32768)` |
//! | `Signed24In32` | `(v >> 8) / 2^23` | `round(x * 2^23) << 8` |
//! | `Float` | `v` | `clamp(x, -1, 1)` |

use crate::format::SampleFormat;

const U8_SCALE: f64 = 128.0;
const I16_SCALE: f64 = 32768.0;
const I24_SCALE: f64 = 8_388_608.0;

/// Interleaved samples in one of the supported representations.
#[derive(Clone, Debug, PartialEq)]
pub enum AudioData {
    /// Unsigned 8-bit samples.
    Unsigned8(Vec<u8>),
    /// Signed 16-bit samples.
    Signed16(Vec<i16>),
    /// Signed 24-bit samples, left-justified in 32 bits.
    Signed24In32(Vec<i32>),
    /// Float samples.
    Float(Vec<f32>),
}

impl AudioData {
    /// `samples` samples of silence.
    pub fn silence(format: SampleFormat, samples: usize) -> Self {
        match format {
            SampleFormat::Unsigned8 => AudioData::Unsigned8(vec![0x80; samples]),
            SampleFormat::Signed16 => AudioData::Signed16(vec![0; samples]),
            SampleFormat::Signed24In32 => AudioData::Signed24In32(vec![0; samples]),
            SampleFormat::Float => AudioData::Float(vec![0.0; samples]),
        }
    }

    /// Encodes normalized values, clamping anything out of range.
    pub fn from_normalized<I>(format: SampleFormat, values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let values = values.into_iter();
        match format {
            SampleFormat::Unsigned8 => AudioData::Unsigned8(values.map(encode_u8).collect()),
            SampleFormat::Signed16 => AudioData::Signed16(values.map(encode_i16).collect()),
            SampleFormat::Signed24In32 => {
                AudioData::Signed24In32(values.map(encode_i24_in_32).collect())
            }
            SampleFormat::Float => AudioData::Float(values.map(encode_f32).collect()),
        }
    }

    /// The representation.
    pub fn sample_format(&self) -> SampleFormat {
        match self {
            AudioData::Unsigned8(_) => SampleFormat::Unsigned8,
            AudioData::Signed16(_) => SampleFormat::Signed16,
            AudioData::Signed24In32(_) => SampleFormat::Signed24In32,
            AudioData::Float(_) => SampleFormat::Float,
        }
    }

    /// Number of samples (not frames).
    pub fn len(&self) -> usize {
        match self {
            AudioData::Unsigned8(v) => v.len(),
            AudioData::Signed16(v) => v.len(),
            AudioData::Signed24In32(v) => v.len(),
            AudioData::Float(v) => v.len(),
        }
    }

    /// True when there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample `index`, normalized to `f32`.
    #[inline]
    pub fn normalized(&self, index: usize) -> f32 {
        match self {
            AudioData::Unsigned8(v) => (f32::from(v[index]) - 128.0) / U8_SCALE as f32,
            AudioData::Signed16(v) => f32::from(v[index]) / I16_SCALE as f32,
            AudioData::Signed24In32(v) => (v[index] >> 8) as f32 / I24_SCALE as f32,
            AudioData::Float(v) => v[index],
        }
    }

    /// All samples, normalized.
    pub fn to_normalized(&self) -> Vec<f32> {
        (0..self.len()).map(|i| self.normalized(i)).collect()
    }

    /// Copies samples `[start, end)` into a new buffer of the same type.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        match self {
            AudioData::Unsigned8(v) => AudioData::Unsigned8(v[start..end].to_vec()),
            AudioData::Signed16(v) => AudioData::Signed16(v[start..end].to_vec()),
            AudioData::Signed24In32(v) => AudioData::Signed24In32(v[start..end].to_vec()),
            AudioData::Float(v) => AudioData::Float(v[start..end].to_vec()),
        }
    }

    /// Float samples, if this is float data.
    pub fn as_float(&self) -> Option<&[f32]> {
        match self {
            AudioData::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Mutable float samples, if this is float data.
    pub fn as_float_mut(&mut self) -> Option<&mut [f32]> {
        match self {
            AudioData::Float(v) => Some(v),
            _ => None,
        }
    }
}

#[inline]
fn encode_u8(x: f64) -> u8 {
    (libm::round(x * U8_SCALE) + 128.0).clamp(0.0, 255.0) as u8
}

#[inline]
fn encode_i16(x: f64) -> i16 {
    libm::round(x * I16_SCALE).clamp(-I16_SCALE, I16_SCALE - 1.0) as i16
}

#[inline]
fn encode_i24_in_32(x: f64) -> i32 {
    let v = libm::round(x * I24_SCALE).clamp(-I24_SCALE, I24_SCALE - 1.0) as i32;
    v << 8
}

#[inline]
fn encode_f32(x: f64) -> f32 {
    if x.is_nan() {
        return 0.0;
    }
    x.clamp(-1.0, 1.0) as f32
}
