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

//! Waveform loading and caching.
//!
//! Every sound is decoded and converted to the engine's target format exactly
//! once, so the render path only ever copies and mixes bytes.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::error::LoadError;
use crate::audio::convert::ConversionPlan;
use crate::audio::decode::Decoder;
use crate::audio::format::AudioSpec;

/// An immutable, fully converted sample buffer for one source.
#[derive(Debug)]
pub struct Waveform {
    /// The source name this waveform was loaded from.
    name: String,
    /// The format of `samples` (always the engine's target format).
    spec: AudioSpec,
    /// Interleaved sample bytes. Never mutated after construction.
    samples: Box<[u8]>,
}

impl Waveform {
    pub fn new(name: impl Into<String>, spec: AudioSpec, samples: Vec<u8>) -> Self {
        Waveform {
            name: name.into(),
            spec,
            samples: samples.into_boxed_slice(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> AudioSpec {
        self.spec
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Length of the sample buffer in bytes.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length at the waveform's sample rate.
    pub fn duration(&self) -> Duration {
        let bytes_per_second = self.spec.bytes_per_second();
        if bytes_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.len() as f64 / bytes_per_second as f64)
    }
}

/// Decodes sources on first use and caches the converted result by name.
pub struct WaveformStore {
    /// Converted waveforms by source name. Entries are never removed.
    cache: RwLock<HashMap<String, Arc<Waveform>>>,
    /// Collaborator that turns a name into native PCM.
    decoder: Box<dyn Decoder>,
    /// The format every waveform is converted to.
    target: AudioSpec,
}

impl WaveformStore {
    /// Creates a new store converting into `target`.
    pub fn new(decoder: Box<dyn Decoder>, target: AudioSpec) -> Self {
        WaveformStore {
            cache: RwLock::new(HashMap::new()),
            decoder,
            target,
        }
    }

    /// Returns the waveform for `name`, decoding and converting it first if it
    /// hasn't been seen. The cache is only written after a successful
    /// conversion, so a failure leaves no entry behind.
    pub fn resolve(&self, name: &str) -> Result<Arc<Waveform>, LoadError> {
        if let Some(waveform) = self.cache.read().get(name) {
            debug!(name, "Using cached waveform");
            return Ok(waveform.clone());
        }

        // Decode outside the lock; loads are rare and may touch the disk.
        let waveform = Arc::new(self.load(name)?);

        let mut cache = self.cache.write();
        // Another thread may have won the race. Keep the first entry so every
        // caller sees the same waveform.
        let entry = cache.entry(name.to_string()).or_insert(waveform);
        Ok(entry.clone())
    }

    /// Returns the cached waveform for `name` without loading it.
    pub fn get(&self, name: &str) -> Option<Arc<Waveform>> {
        self.cache.read().get(name).cloned()
    }

    /// Number of cached waveforms.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Total bytes held by cached waveforms.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.read().values().map(|w| w.len()).sum()
    }

    /// Drops every cached waveform. Only called at teardown.
    pub(crate) fn clear(&self) {
        self.cache.write().clear();
    }

    fn load(&self, name: &str) -> Result<Waveform, LoadError> {
        info!(name, "Loading sound into memory");

        let decoded = self.decoder.decode(name).map_err(|source| LoadError::Decode {
            name: name.to_string(),
            source,
        })?;

        let convert_error = |source| LoadError::Convert {
            name: name.to_string(),
            source,
        };
        let plan = ConversionPlan::build(decoded.spec, self.target).map_err(convert_error)?;
        if !plan.is_identity() {
            info!(
                name,
                from = %decoded.spec,
                to = %self.target,
                multiplier = plan.len_multiplier(),
                "Converting sound"
            );
        }
        let samples = plan.convert(&decoded.data).map_err(convert_error)?;

        let waveform = Waveform::new(name, self.target, samples);
        info!(
            name,
            bytes = waveform.len(),
            duration_ms = waveform.duration().as_millis(),
            "Sound loaded"
        );
        Ok(waveform)
    }
}

impl std::fmt::Debug for WaveformStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveformStore")
            .field("cached_waveforms", &self.len())
            .field("target", &self.target)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::SampleEncoding;
    use crate::testutil::MemoryDecoder;

    fn target() -> AudioSpec {
        AudioSpec::new(44100, 2, SampleEncoding::S16)
    }

    #[test]
    fn test_resolve_caches_by_name() {
        let decoder = MemoryDecoder::new();
        decoder.insert("laser", target(), vec![1; 1000]);
        let loads = decoder.load_counter();
        let store = WaveformStore::new(Box::new(decoder), target());

        let first = store.resolve("laser").unwrap();
        let second = store.resolve("laser").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.get(), 1);
        assert_eq!(first.len(), 1000);
        assert_eq!(first.name(), "laser");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_resolve_converts_to_target() {
        let decoder = MemoryDecoder::new();
        let mono: Vec<u8> = [100i16, 200].iter().flat_map(|s| s.to_le_bytes()).collect();
        decoder.insert("beep", AudioSpec::new(44100, 1, SampleEncoding::S16), mono);
        let store = WaveformStore::new(Box::new(decoder), target());

        let waveform = store.resolve("beep").unwrap();

        assert_eq!(waveform.spec(), target());
        assert_eq!(waveform.len(), 8);
        assert_eq!(&waveform.samples()[..4], &[100, 0, 100, 0]);
    }

    #[test]
    fn test_decode_failure_leaves_no_entry() {
        let decoder = MemoryDecoder::new();
        let loads = decoder.load_counter();
        let store = WaveformStore::new(Box::new(decoder), target());

        let err = store.resolve("missing").unwrap_err();

        assert_eq!(err.name(), "missing");
        assert!(matches!(err, LoadError::Decode { .. }));
        assert!(store.get("missing").is_none());
        assert!(store.is_empty());

        // A later attempt tries again rather than hitting a poisoned entry.
        assert!(store.resolve("missing").is_err());
        assert_eq!(loads.get(), 2);
    }

    #[test]
    fn test_conversion_failure_leaves_no_entry() {
        let decoder = MemoryDecoder::new();
        // Three bytes is not a whole S16 stereo frame.
        decoder.insert("broken", target(), vec![0, 1, 2]);
        let store = WaveformStore::new(Box::new(decoder), target());

        let err = store.resolve("broken").unwrap_err();

        assert!(matches!(err, LoadError::Convert { .. }));
        assert_eq!(err.name(), "broken");
        assert!(store.is_empty());
    }

    #[test]
    fn test_waveform_duration() {
        let waveform = Waveform::new("tone", target(), vec![0; 176400]);
        assert_eq!(waveform.duration(), Duration::from_secs(1));
    }
}
