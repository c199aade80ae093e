//! WAV output for rendered mixes.

use std::path::Path;

use hound::{SampleFormat as HoundFormat, WavSpec, WavWriter};
use tributary_core::{Format, SampleFormat};

/// The WAV header matching a stream format.
pub fn wav_spec(format: &Format) -> WavSpec {
    let (bits_per_sample, sample_format) = match format.sample_format() {
        SampleFormat::Unsigned8 => (8, HoundFormat::Int),
        SampleFormat::Signed16 => (16, HoundFormat::Int),
        SampleFormat::Signed24In32 => (24, HoundFormat::Int),
        SampleFormat::Float => (32, HoundFormat::Float),
    };
    WavSpec {
        channels: format.channels() as u16,
        sample_rate: format.frames_per_second(),
        bits_per_sample,
        sample_format,
    }
}

/// Writes interleaved normalized samples in `format`'s encoding.
pub fn write_wav(path: &Path, samples: &[f32], format: &Format) -> hound::Result<()> {
    let spec = wav_spec(format);
    let mut writer = WavWriter::create(path, spec)?;

    if spec.sample_format == HoundFormat::Float {
        for &sample in samples {
            writer.write_sample(sample)?;
        }
    } else {
        let max_val = (1i32 << (spec.bits_per_sample - 1)) as f32;
        for &sample in samples {
            let int_sample = (sample * max_val).clamp(-max_val, max_val - 1.0) as i32;
            if spec.bits_per_sample == 8 {
                writer.write_sample(int_sample as i8)?;
            } else {
                writer.write_sample(int_sample)?;
            }
        }
    }

    writer.finalize()
}
