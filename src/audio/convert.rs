// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! One-shot conversion of native PCM into the engine's target format.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::format::AudioSpec;

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Errors raised while building or running a conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid audio spec {0}: rate and channel count must be non-zero")]
    InvalidSpec(AudioSpec),

    #[error("Buffer of {len} bytes is not a whole number of {frame_size}-byte frames")]
    PartialFrame { len: usize, frame_size: usize },

    #[error("Resampling failed: {from}Hz -> {to}Hz: {reason}")]
    ResamplingFailed { from: u32, to: u32, reason: String },
}

/// A validated plan for converting buffers from one spec to another.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionPlan {
    from: AudioSpec,
    to: AudioSpec,
}

impl ConversionPlan {
    /// Builds a plan between two specs.
    pub fn build(from: AudioSpec, to: AudioSpec) -> Result<Self, ConversionError> {
        for spec in [from, to] {
            if spec.sample_rate == 0 || spec.channels == 0 {
                return Err(ConversionError::InvalidSpec(spec));
            }
        }
        Ok(ConversionPlan { from, to })
    }

    /// Returns true if the conversion is a plain copy.
    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    /// How much a buffer grows (or shrinks) in bytes when converted.
    pub fn len_multiplier(&self) -> f64 {
        self.to.bytes_per_second() as f64 / self.from.bytes_per_second() as f64
    }

    /// Converts a native buffer into the target spec.
    pub fn convert(&self, native: &[u8]) -> Result<Vec<u8>, ConversionError> {
        let frame_size = self.from.bytes_per_frame();
        if native.len() % frame_size != 0 {
            return Err(ConversionError::PartialFrame {
                len: native.len(),
                frame_size,
            });
        }
        if self.is_identity() {
            return Ok(native.to_vec());
        }

        let mut planar = self.to_planar(native);
        planar = remap_channels(planar, self.to.channels as usize);
        if self.from.sample_rate != self.to.sample_rate {
            planar = resample(planar, self.from.sample_rate, self.to.sample_rate)?;
        }

        let capacity = (native.len() as f64 * self.len_multiplier()).ceil() as usize
            + self.to.bytes_per_frame();
        let mut output = Vec::with_capacity(capacity);
        let frames = planar.first().map(|c| c.len()).unwrap_or(0);
        for frame in 0..frames {
            for channel in planar.iter() {
                self.to.encoding.write(channel[frame], &mut output);
            }
        }

        Ok(output)
    }

    /// Splits interleaved native bytes into per-channel floats.
    fn to_planar(&self, native: &[u8]) -> Vec<Vec<f32>> {
        let frame_size = self.from.bytes_per_frame();
        let sample_size = self.from.encoding.bytes_per_sample();
        let frames = native.len() / frame_size;

        let mut planar = vec![Vec::with_capacity(frames); self.from.channels as usize];
        for frame in native.chunks_exact(frame_size) {
            for (channel, sample) in planar.iter_mut().zip(frame.chunks_exact(sample_size)) {
                channel.push(self.from.encoding.read(sample));
            }
        }
        planar
    }
}

/// Maps planar channels onto `out_channels`: down to mono averages, otherwise
/// output channel `i` takes input channel `i % in_channels`.
fn remap_channels(planar: Vec<Vec<f32>>, out_channels: usize) -> Vec<Vec<f32>> {
    let in_channels = planar.len();
    if in_channels == out_channels || in_channels == 0 {
        return planar;
    }

    if out_channels == 1 {
        let frames = planar[0].len();
        let mono = (0..frames)
            .map(|i| planar.iter().map(|c| c[i]).sum::<f32>() / in_channels as f32)
            .collect();
        return vec![mono];
    }

    (0..out_channels)
        .map(|i| planar[i % in_channels].clone())
        .collect()
}

/// Resamples a whole planar clip, trimming the resampler's delay so the
/// output lines up with the input.
fn resample(
    planar: Vec<Vec<f32>>,
    from: u32,
    to: u32,
) -> Result<Vec<Vec<f32>>, ConversionError> {
    let channels = planar.len();
    let frames = planar.first().map(|c| c.len()).unwrap_or(0);
    if frames == 0 {
        return Ok(planar);
    }

    let failed = |reason: String| ConversionError::ResamplingFailed { from, to, reason };

    let ratio = to as f64 / from as f64;
    let expected = (frames as f64 * ratio).ceil() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, INPUT_BLOCK_SIZE, channels)
        .map_err(|e| failed(e.to_string()))?;
    let delay = resampler.output_delay();

    let mut output = vec![Vec::with_capacity(expected + delay); channels];
    let append = |processed: Vec<Vec<f32>>, output: &mut Vec<Vec<f32>>| {
        for (out, chunk) in output.iter_mut().zip(processed) {
            out.extend_from_slice(&chunk);
        }
    };

    let mut position = 0;
    while frames - position >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let chunk: Vec<&[f32]> = planar
            .iter()
            .map(|c| &c[position..position + needed])
            .collect();
        let processed = resampler
            .process(&chunk, None)
            .map_err(|e| failed(e.to_string()))?;
        append(processed, &mut output);
        position += needed;
    }

    if position < frames {
        let chunk: Vec<&[f32]> = planar.iter().map(|c| &c[position..]).collect();
        let processed = resampler
            .process_partial(Some(chunk.as_slice()), None)
            .map_err(|e| failed(e.to_string()))?;
        append(processed, &mut output);
    }

    // Flush the tail still held back by the filter delay.
    while output[0].len() < expected + delay {
        let processed = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| failed(e.to_string()))?;
        if processed.first().map(|c| c.is_empty()).unwrap_or(true) {
            break;
        }
        append(processed, &mut output);
    }

    for channel in output.iter_mut() {
        channel.drain(..delay.min(channel.len()));
        channel.truncate(expected);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::SampleEncoding;

    fn s16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn s16_samples(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    #[test]
    fn test_build_rejects_invalid_spec() {
        let good = AudioSpec::new(44100, 2, SampleEncoding::S16);
        assert!(ConversionPlan::build(AudioSpec::new(0, 2, SampleEncoding::S16), good).is_err());
        assert!(ConversionPlan::build(good, AudioSpec::new(44100, 0, SampleEncoding::S16)).is_err());
    }

    #[test]
    fn test_len_multiplier() {
        let plan = ConversionPlan::build(
            AudioSpec::new(22050, 1, SampleEncoding::U8),
            AudioSpec::new(44100, 2, SampleEncoding::S16),
        )
        .unwrap();
        assert_eq!(plan.len_multiplier(), 8.0);
    }

    #[test]
    fn test_identity_copies() {
        let spec = AudioSpec::new(44100, 2, SampleEncoding::S16);
        let plan = ConversionPlan::build(spec, spec).unwrap();
        let input = s16_bytes(&[1, 2, 3, 4]);

        assert!(plan.is_identity());
        assert_eq!(plan.convert(&input).unwrap(), input);
    }

    #[test]
    fn test_partial_frame_rejected() {
        let plan = ConversionPlan::build(
            AudioSpec::new(44100, 2, SampleEncoding::S16),
            AudioSpec::new(44100, 2, SampleEncoding::F32),
        )
        .unwrap();

        let err = plan.convert(&[0, 1, 2]).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::PartialFrame {
                len: 3,
                frame_size: 4
            }
        ));
    }

    #[test]
    fn test_mono_to_stereo_duplicates() {
        let plan = ConversionPlan::build(
            AudioSpec::new(44100, 1, SampleEncoding::S16),
            AudioSpec::new(44100, 2, SampleEncoding::S16),
        )
        .unwrap();

        let output = plan.convert(&s16_bytes(&[100, -200])).unwrap();

        assert_eq!(s16_samples(&output), vec![100, 100, -200, -200]);
    }

    #[test]
    fn test_stereo_to_mono_averages() {
        let plan = ConversionPlan::build(
            AudioSpec::new(44100, 2, SampleEncoding::S16),
            AudioSpec::new(44100, 1, SampleEncoding::S16),
        )
        .unwrap();

        let output = plan.convert(&s16_bytes(&[1000, 3000, -1000, 1000])).unwrap();

        assert_eq!(s16_samples(&output), vec![2000, 0]);
    }

    #[test]
    fn test_u8_to_s16() {
        let plan = ConversionPlan::build(
            AudioSpec::new(8000, 1, SampleEncoding::U8),
            AudioSpec::new(8000, 1, SampleEncoding::S16),
        )
        .unwrap();

        let output = plan.convert(&[0x80, 0xC0, 0x00]).unwrap();

        assert_eq!(s16_samples(&output), vec![0, 16384, -32768]);
    }

    #[test]
    fn test_resample_lengths() {
        let source: Vec<i16> = (0..4410)
            .map(|i| ((i as f32 * 0.05).sin() * 8000.0) as i16)
            .collect();
        let input = s16_bytes(&source);

        let up = ConversionPlan::build(
            AudioSpec::new(22050, 1, SampleEncoding::S16),
            AudioSpec::new(44100, 1, SampleEncoding::S16),
        )
        .unwrap();
        assert_eq!(up.convert(&input).unwrap().len(), 4410 * 2 * 2);

        let down = ConversionPlan::build(
            AudioSpec::new(44100, 1, SampleEncoding::S16),
            AudioSpec::new(22050, 1, SampleEncoding::S16),
        )
        .unwrap();
        assert_eq!(down.convert(&input).unwrap().len(), 2205 * 2);
    }

    #[test]
    fn test_empty_input() {
        let plan = ConversionPlan::build(
            AudioSpec::new(22050, 1, SampleEncoding::S16),
            AudioSpec::new(44100, 2, SampleEncoding::F32),
        )
        .unwrap();
        assert!(plan.convert(&[]).unwrap().is_empty());
    }
}
