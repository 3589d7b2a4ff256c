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

//! Ties an output device to a mix engine.
//!
//! Audio is optional: if the device can't be opened the system still comes up,
//! with the engine in silent mode.

use std::fmt;
use std::sync::Arc;

use tracing::{info, span, warn, Level};

use crate::audio::{self, decode::Decoder, decode::SymphoniaDecoder, Device};
use crate::config::{self, ConfigError};
use crate::sounds::MixEngine;

pub struct SoundSystem {
    /// The open device, if any. Dropped before the engine so rendering has
    /// stopped before cursors and waveforms go away.
    device: Option<Box<dyn Device>>,
    engine: Arc<MixEngine>,
}

impl SoundSystem {
    /// Opens the configured device and starts rendering, decoding sounds from
    /// disk.
    pub fn new(config: &config::Audio) -> Result<SoundSystem, ConfigError> {
        let decoder = SymphoniaDecoder::new(config.sound_path().map(|p| p.to_path_buf()));
        SoundSystem::with_decoder(config, Box::new(decoder))
    }

    /// Like [`SoundSystem::new`] with a custom decoder.
    pub fn with_decoder(
        config: &config::Audio,
        decoder: Box<dyn Decoder>,
    ) -> Result<SoundSystem, ConfigError> {
        let span = span!(Level::INFO, "sound system");
        let _enter = span.enter();

        let target_format = config.target_format()?;
        let volume = config.volume()?;
        let engine = Arc::new(MixEngine::new(target_format.clone(), decoder)?);
        engine
            .set_volume(volume)
            .map_err(|e| ConfigError::Volume(e.volume))?;

        let device = audio::get_device(config, target_format).and_then(|device| {
            device.start(engine.clone())?;
            Ok(device)
        });
        let device = match device {
            Ok(device) => {
                info!(device = %device, "Audio device ready");
                Some(device)
            }
            Err(e) => {
                warn!(
                    err = %e,
                    device = config.device(),
                    "Unable to open audio device, continuing without sound"
                );
                engine.disable();
                None
            }
        };

        Ok(SoundSystem { device, engine })
    }

    pub fn engine(&self) -> &Arc<MixEngine> {
        &self.engine
    }

    pub fn device(&self) -> Option<&dyn Device> {
        self.device.as_deref()
    }

    /// Halts or resumes rendering. Does nothing without a device.
    pub fn pause(&self, paused: bool) {
        if let Some(device) = &self.device {
            device.pause(paused);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.device.as_ref().is_some_and(|device| device.is_paused())
    }
}

impl Drop for SoundSystem {
    fn drop(&mut self) {
        self.engine.stop_all();
        if let Some(device) = self.device.take() {
            device.pause(true);
            // Joins the render thread.
            drop(device);
        }
        info!("Sound system shut down");
    }
}

impl fmt::Debug for SoundSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundSystem")
            .field("device", &self.device.as_ref().map(|d| d.to_string()))
            .field("engine", &self.engine)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::{AudioSpec, SampleEncoding};
    use crate::testutil::{eventually, write_wav_with_bits, MemoryDecoder};
    use serial_test::serial;
    use tempfile::tempdir;

    fn decoder() -> Box<MemoryDecoder> {
        let decoder = MemoryDecoder::new();
        let spec = config::Audio::new("mock")
            .target_format()
            .unwrap()
            .spec()
            .unwrap();
        let samples: Vec<u8> = [2000i16; 256].iter().flat_map(|s| s.to_le_bytes()).collect();
        decoder.insert("ding", spec, samples);
        Box::new(decoder)
    }

    #[test]
    fn test_mock_system_plays() {
        let config = config::Audio::new("mock-system");
        let system = SoundSystem::with_decoder(&config, decoder()).unwrap();

        assert!(system.engine().is_usable());
        let mock = system.device().and_then(|d| d.to_mock()).unwrap();

        system.engine().play("ding", true).unwrap().unwrap();
        eventually(
            || mock.last_block().iter().any(|&b| b != 0),
            "Looping sound never rendered",
        );

        system.pause(true);
        assert!(system.is_paused());
        system.pause(false);
        assert!(!system.is_paused());
    }

    #[test]
    fn test_drop_stops_sounds() {
        let config = config::Audio::new("mock-system");
        let system = SoundSystem::with_decoder(&config, decoder()).unwrap();
        let cursor = system.engine().play("ding", true).unwrap().unwrap();

        drop(system);

        assert!(!cursor.is_looping());
        assert_eq!(cursor.position(), cursor.waveform().len());
    }

    #[test]
    #[serial]
    fn test_invalid_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "device: mock\nbits_per_sample: 12\n").unwrap();
        let config = config::Audio::load(Some(&path)).unwrap();

        assert!(matches!(
            SoundSystem::with_decoder(&config, decoder()),
            Err(ConfigError::Format(_))
        ));
    }

    #[test]
    #[serial]
    fn test_plays_wav_from_sound_path() {
        let dir = tempdir().unwrap();
        write_wav_with_bits(dir.path().join("tone.wav"), vec![8000i16; 512], 22050, 1, 16)
            .unwrap();
        std::fs::write(
            dir.path().join("sfxmix.yaml"),
            format!("device: mock\nsound_path: {}\n", dir.path().display()),
        )
        .unwrap();
        let config = config::Audio::load(Some(&dir.path().join("sfxmix.yaml"))).unwrap();
        let system = SoundSystem::new(&config).unwrap();

        let waveform = system.engine().load("tone.wav").unwrap().unwrap();

        // 512 mono frames at 22050Hz become 1024 stereo s16 frames at 44100Hz.
        assert_eq!(waveform.spec(), AudioSpec::new(44100, 2, SampleEncoding::S16));
        assert_eq!(waveform.len(), 1024 * 4);
    }
}
