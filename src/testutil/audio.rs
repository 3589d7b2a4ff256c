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

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::{error::Error, fs::File, io, path::PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;

use crate::audio::decode::{DecodeError, DecodedAudio, Decoder};
use crate::audio::format::AudioSpec;

/// Writes interleaved `samples` to a WAV file at `path`.
pub fn write_wav_with_bits<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<S>,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;

    // Determine sample format based on the type
    let sample_format = if std::any::TypeId::of::<S>() == std::any::TypeId::of::<f32>() {
        SampleFormat::Float
    } else if std::any::TypeId::of::<S>() == std::any::TypeId::of::<i32>()
        || std::any::TypeId::of::<S>() == std::any::TypeId::of::<i16>()
        || std::any::TypeId::of::<S>() == std::any::TypeId::of::<i8>()
    {
        SampleFormat::Int
    } else {
        return Err("Unsupported sample format".into());
    };

    let mut writer = WavWriter::new(
        tempwav,
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample,
            sample_format,
        },
    )?;
    for sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(())
}

/// Counts decode attempts made through a [`MemoryDecoder`].
#[derive(Debug, Clone, Default)]
pub struct LoadCounter(Arc<AtomicUsize>);

impl LoadCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A decoder serving pre-registered buffers by name. Unknown names fail like a
/// missing file.
#[derive(Debug, Default)]
pub struct MemoryDecoder {
    sounds: Mutex<HashMap<String, DecodedAudio>>,
    loads: LoadCounter,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, spec: AudioSpec, data: Vec<u8>) {
        self.sounds
            .lock()
            .insert(name.to_string(), DecodedAudio::new(spec, data));
    }

    pub fn load_counter(&self) -> LoadCounter {
        self.loads.clone()
    }
}

impl Decoder for MemoryDecoder {
    fn decode(&self, name: &str) -> Result<DecodedAudio, DecodeError> {
        self.loads.0.fetch_add(1, Ordering::SeqCst);
        self.sounds
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| DecodeError::Io {
                path: PathBuf::from(name),
                source: io::Error::new(io::ErrorKind::NotFound, "no such sound"),
            })
    }
}
