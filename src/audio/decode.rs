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

//! Whole-file decoding of sound sources into native PCM bytes.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder as _, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use super::format::{AudioSpec, SampleEncoding};

/// Errors raised while decoding a sound source.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}': unrecognized container: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: SymphoniaError,
    },

    #[error("'{0}': no audio track found")]
    NoTrack(PathBuf),

    #[error("'{0}': sample rate not specified")]
    UnknownSampleRate(PathBuf),

    #[error("'{0}': channel count could not be determined")]
    UnknownChannels(PathBuf),

    #[error("'{0}': decoder changed sample type mid-stream")]
    InconsistentFormat(PathBuf),

    #[error("Audio file error: {0}")]
    Audio(#[from] SymphoniaError),
}

/// A decoded sound in its native format.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Native rate, channel count and byte layout.
    pub spec: AudioSpec,
    /// Interleaved little-endian samples.
    pub data: Vec<u8>,
}

impl DecodedAudio {
    pub fn new(spec: AudioSpec, data: Vec<u8>) -> Self {
        DecodedAudio { spec, data }
    }
}

/// Turns a source name into native PCM. Implementations must be callable from
/// any control thread.
pub trait Decoder: Send + Sync {
    fn decode(&self, name: &str) -> Result<DecodedAudio, DecodeError>;
}

/// Decodes files with symphonia (WAV, FLAC, MP3, OGG, ...).
#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder {
    /// Directory that relative names are resolved against.
    base_path: Option<PathBuf>,
}

impl SymphoniaDecoder {
    pub fn new(base_path: Option<PathBuf>) -> Self {
        SymphoniaDecoder { base_path }
    }

    fn resolve_path(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&self, name: &str) -> Result<DecodedAudio, DecodeError> {
        let path = self.resolve_path(name);
        let file = File::open(&path).map_err(|source| DecodeError::Io {
            path: path.clone(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|source| DecodeError::Probe {
                path: path.clone(),
                source,
            })?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::NoTrack(path.clone()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| DecodeError::UnknownSampleRate(path.clone()))?;
        let mut channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);

        let mut decoder = get_codecs().make(&params, &DecoderOptions::default())?;

        let mut encoding: Option<SampleEncoding> = None;
        let mut data = Vec::new();
        loop {
            let packet = match next_packet(format_reader.as_mut()) {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!(path = ?path, error = e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if channels == 0 {
                channels = decoded.spec().channels.count() as u16;
            }

            let packet_encoding = native_encoding(&decoded);
            match encoding {
                None => encoding = Some(packet_encoding),
                Some(existing) if existing != packet_encoding => {
                    return Err(DecodeError::InconsistentFormat(path));
                }
                Some(_) => {}
            }
            append_native(decoded, &mut data);
        }

        if channels == 0 {
            return Err(DecodeError::UnknownChannels(path));
        }

        let spec = AudioSpec::new(
            sample_rate,
            channels,
            encoding.unwrap_or(SampleEncoding::S16),
        );
        debug!(path = ?path, spec = %spec, bytes = data.len(), "Decoded sound");

        Ok(DecodedAudio::new(spec, data))
    }
}

/// Reads the next packet, mapping end-of-stream to `Ok(None)`.
fn next_packet(
    format_reader: &mut dyn FormatReader,
) -> Result<Option<symphonia::core::formats::Packet>, SymphoniaError> {
    match format_reader.next_packet() {
        Ok(packet) => Ok(Some(packet)),
        Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// The closest byte encoding that holds a decoded buffer without loss of range.
fn native_encoding(decoded: &AudioBufferRef) -> SampleEncoding {
    match decoded {
        AudioBufferRef::U8(_) | AudioBufferRef::S8(_) => SampleEncoding::U8,
        AudioBufferRef::U16(_) | AudioBufferRef::S16(_) => SampleEncoding::S16,
        AudioBufferRef::U24(_)
        | AudioBufferRef::S24(_)
        | AudioBufferRef::U32(_)
        | AudioBufferRef::S32(_) => SampleEncoding::S32,
        AudioBufferRef::F32(_) | AudioBufferRef::F64(_) => SampleEncoding::F32,
    }
}

/// Appends a decoded buffer to `out`, interleaved in its native encoding.
fn append_native(decoded: AudioBufferRef, out: &mut Vec<u8>) {
    match decoded {
        AudioBufferRef::U8(buf) => interleave(&buf, out, |s, out| out.push(s)),
        AudioBufferRef::S8(buf) => interleave(&buf, out, |s, out| out.push((s as i16 + 128) as u8)),
        AudioBufferRef::S16(buf) => {
            interleave(&buf, out, |s, out| out.extend_from_slice(&s.to_le_bytes()))
        }
        AudioBufferRef::U16(buf) => interleave(&buf, out, |s, out| {
            out.extend_from_slice(&((s as i32 - 0x8000) as i16).to_le_bytes())
        }),
        AudioBufferRef::S24(buf) => interleave(&buf, out, |s, out| {
            out.extend_from_slice(&(s.inner() << 8).to_le_bytes())
        }),
        AudioBufferRef::U24(buf) => interleave(&buf, out, |s, out| {
            out.extend_from_slice(&((s.inner() as i32 - 0x80_0000) << 8).to_le_bytes())
        }),
        AudioBufferRef::S32(buf) => {
            interleave(&buf, out, |s, out| out.extend_from_slice(&s.to_le_bytes()))
        }
        AudioBufferRef::U32(buf) => interleave(&buf, out, |s, out| {
            out.extend_from_slice(&((s as i64 - 0x8000_0000) as i32).to_le_bytes())
        }),
        AudioBufferRef::F32(buf) => {
            interleave(&buf, out, |s, out| out.extend_from_slice(&s.to_le_bytes()))
        }
        AudioBufferRef::F64(buf) => interleave(&buf, out, |s, out| {
            out.extend_from_slice(&(s as f32).to_le_bytes())
        }),
    }
}

/// Interleaves a planar symphonia buffer, encoding each sample with `encode`.
fn interleave<T, F>(buf: &AudioBuffer<T>, out: &mut Vec<u8>, encode: F)
where
    T: Sample,
    F: Fn(T, &mut Vec<u8>),
{
    let frames = buf.frames();
    let channels = buf.spec().channels.count();
    let planes = buf.planes();
    for frame_idx in 0..frames {
        for ch_idx in 0..channels {
            encode(planes.planes()[ch_idx][frame_idx], out);
        }
    }
}
