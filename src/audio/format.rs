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

use std::{fmt, str::FromStr};

/// Error for formats the engine can't represent.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FormatError {
    #[error("Unsupported sample format: {0}")]
    UnknownSampleFormat(String),

    #[error("Unsupported {format} sample width: {bits} bits")]
    UnsupportedWidth { format: SampleFormat, bits: u16 },

    #[error("Sample rate must be greater than 0")]
    ZeroSampleRate,

    #[error("Channel count must be greater than 0")]
    ZeroChannels,
}

/// Sample format enumeration for audio processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Integer samples (e.g., 8-bit, 16-bit, 32-bit)
    Int,
    /// Floating point samples (32-bit float)
    Float,
}

impl FromStr for SampleFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float" | "Float" => Ok(SampleFormat::Float),
            "int" | "Int" => Ok(SampleFormat::Int),
            _ => Err(FormatError::UnknownSampleFormat(s.to_string())),
        }
    }
}

impl SampleFormat {
    /// Convert to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Byte layout of interleaved little-endian PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleEncoding {
    /// Unsigned 8-bit, biased around 0x80.
    U8,
    /// Signed 16-bit.
    S16,
    /// Signed 32-bit.
    S32,
    /// 32-bit float in [-1.0, 1.0].
    F32,
}

impl SampleEncoding {
    /// Size of one sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleEncoding::U8 => 1,
            SampleEncoding::S16 => 2,
            SampleEncoding::S32 | SampleEncoding::F32 => 4,
        }
    }

    /// The byte value that encodes silence.
    pub fn silence(self) -> u8 {
        match self {
            SampleEncoding::U8 => 0x80,
            _ => 0x00,
        }
    }

    /// Reads the sample starting at `bytes[0]` as a float in [-1.0, 1.0].
    #[inline]
    pub fn read(self, bytes: &[u8]) -> f32 {
        match self {
            SampleEncoding::U8 => (bytes[0] as f32 - 128.0) / 128.0,
            SampleEncoding::S16 => {
                i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / (1i64 << 15) as f32
            }
            SampleEncoding::S32 => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32
                    / (1i64 << 31) as f32
            }
            SampleEncoding::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    /// Appends `sample` to `out`, clamped to this encoding's range.
    #[inline]
    pub fn write(self, sample: f32, out: &mut Vec<u8>) {
        let sample = sample.clamp(-1.0, 1.0);
        match self {
            SampleEncoding::U8 => {
                out.push((sample * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8);
            }
            SampleEncoding::S16 => {
                let scaled = (sample * (1i64 << 15) as f32)
                    .round()
                    .clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                out.extend_from_slice(&scaled.to_le_bytes());
            }
            SampleEncoding::S32 => {
                let scaled = (sample as f64 * (1i64 << 31) as f64)
                    .round()
                    .clamp(i32::MIN as f64, i32::MAX as f64) as i32;
                out.extend_from_slice(&scaled.to_le_bytes());
            }
            SampleEncoding::F32 => out.extend_from_slice(&sample.to_le_bytes()),
        }
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleEncoding::U8 => "u8",
            SampleEncoding::S16 => "s16le",
            SampleEncoding::S32 => "s32le",
            SampleEncoding::F32 => "f32le",
        };
        write!(f, "{}", name)
    }
}

/// Full description of a PCM buffer: rate, channel count and byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: SampleEncoding,
}

impl AudioSpec {
    pub fn new(sample_rate: u32, channels: u16, encoding: SampleEncoding) -> Self {
        AudioSpec {
            sample_rate,
            channels,
            encoding,
        }
    }

    /// Size of one interleaved frame in bytes.
    pub fn bytes_per_frame(&self) -> usize {
        self.encoding.bytes_per_sample() * self.channels as usize
    }

    /// Bytes consumed per second of audio.
    pub fn bytes_per_second(&self) -> usize {
        self.bytes_per_frame() * self.sample_rate as usize
    }
}

impl fmt::Display for AudioSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz/{}ch/{}",
            self.sample_rate, self.channels, self.encoding
        )
    }
}

/// The single output format every sound is converted to at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Sample format (integer or float)
    pub sample_format: SampleFormat,
    /// Bits per sample
    pub bits_per_sample: u16,
    /// Number of interleaved output channels
    pub channels: u16,
}

impl TargetFormat {
    /// Creates a new TargetFormat, rejecting layouts the mixer can't handle.
    pub fn new(
        sample_rate: u32,
        sample_format: SampleFormat,
        bits_per_sample: u16,
        channels: u16,
    ) -> Result<Self, FormatError> {
        if sample_rate == 0 {
            return Err(FormatError::ZeroSampleRate);
        }
        if channels == 0 {
            return Err(FormatError::ZeroChannels);
        }

        let format = TargetFormat {
            sample_rate,
            sample_format,
            bits_per_sample,
            channels,
        };
        format.encoding()?;
        Ok(format)
    }

    /// The byte encoding for this format.
    pub fn encoding(&self) -> Result<SampleEncoding, FormatError> {
        match (self.sample_format, self.bits_per_sample) {
            (SampleFormat::Int, 8) => Ok(SampleEncoding::U8),
            (SampleFormat::Int, 16) => Ok(SampleEncoding::S16),
            (SampleFormat::Int, 32) => Ok(SampleEncoding::S32),
            (SampleFormat::Float, 32) => Ok(SampleEncoding::F32),
            (format, bits) => Err(FormatError::UnsupportedWidth { format, bits }),
        }
    }

    /// The buffer spec for this format.
    pub fn spec(&self) -> Result<AudioSpec, FormatError> {
        Ok(AudioSpec::new(
            self.sample_rate,
            self.channels,
            self.encoding()?,
        ))
    }
}

impl Default for TargetFormat {
    /// Creates a default target format (44.1kHz, 16-bit integer, stereo)
    fn default() -> Self {
        TargetFormat {
            sample_rate: 44100,
            sample_format: SampleFormat::Int,
            bits_per_sample: 16,
            channels: 2,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz/{}ch/{}{}",
            self.sample_rate, self.channels, self.sample_format, self.bits_per_sample
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_format_from_str() {
        assert_eq!(
            SampleFormat::from_str("float").unwrap(),
            SampleFormat::Float
        );
        assert_eq!(
            SampleFormat::from_str("Float").unwrap(),
            SampleFormat::Float
        );
        assert_eq!(SampleFormat::from_str("int").unwrap(), SampleFormat::Int);
        assert_eq!(SampleFormat::from_str("Int").unwrap(), SampleFormat::Int);
    }

    #[test]
    fn test_sample_format_from_str_invalid() {
        assert!(SampleFormat::from_str("invalid").is_err());
        assert!(SampleFormat::from_str("").is_err());
        assert!(SampleFormat::from_str("double").is_err());
    }

    #[test]
    fn test_sample_format_display() {
        assert_eq!(format!("{}", SampleFormat::Float), "float");
        assert_eq!(format!("{}", SampleFormat::Int), "int");
    }

    #[test]
    fn test_target_format_encoding() {
        let cases = [
            (SampleFormat::Int, 8, SampleEncoding::U8),
            (SampleFormat::Int, 16, SampleEncoding::S16),
            (SampleFormat::Int, 32, SampleEncoding::S32),
            (SampleFormat::Float, 32, SampleEncoding::F32),
        ];
        for (format, bits, encoding) in cases {
            let target = TargetFormat::new(44100, format, bits, 2).unwrap();
            assert_eq!(target.encoding().unwrap(), encoding);
        }
    }

    #[test]
    fn test_target_format_new_invalid() {
        assert_eq!(
            TargetFormat::new(0, SampleFormat::Int, 16, 2),
            Err(FormatError::ZeroSampleRate)
        );
        assert_eq!(
            TargetFormat::new(44100, SampleFormat::Int, 16, 0),
            Err(FormatError::ZeroChannels)
        );
        assert!(TargetFormat::new(44100, SampleFormat::Int, 24, 2).is_err());
        assert!(TargetFormat::new(44100, SampleFormat::Float, 64, 2).is_err());
    }

    #[test]
    fn test_target_format_default() {
        let format = TargetFormat::default();
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.sample_format, SampleFormat::Int);
        assert_eq!(format.bits_per_sample, 16);
        assert_eq!(format.channels, 2);
        assert_eq!(
            format.spec().unwrap(),
            AudioSpec::new(44100, 2, SampleEncoding::S16)
        );
    }

    #[test]
    fn test_spec_sizes() {
        let spec = AudioSpec::new(44100, 2, SampleEncoding::S16);
        assert_eq!(spec.bytes_per_frame(), 4);
        assert_eq!(spec.bytes_per_second(), 176400);
    }

    #[test]
    fn test_encoding_read_write() {
        let mut out = Vec::new();
        SampleEncoding::S16.write(0.5, &mut out);
        assert_eq!(out, 16384i16.to_le_bytes());
        assert!((SampleEncoding::S16.read(&out) - 0.5).abs() < 1e-6);

        out.clear();
        SampleEncoding::U8.write(0.0, &mut out);
        assert_eq!(out, vec![0x80]);

        out.clear();
        SampleEncoding::S16.write(4.0, &mut out);
        assert_eq!(out, i16::MAX.to_le_bytes());

        out.clear();
        SampleEncoding::F32.write(-0.25, &mut out);
        assert_eq!(SampleEncoding::F32.read(&out), -0.25);
    }

    #[test]
    fn test_silence() {
        assert_eq!(SampleEncoding::U8.silence(), 0x80);
        assert_eq!(SampleEncoding::S16.silence(), 0);
        assert_eq!(SampleEncoding::F32.silence(), 0);
    }
}
