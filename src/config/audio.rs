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
use std::path::{Path, PathBuf};
use std::str::FromStr;

use config::{Config, Environment, File};
use serde::Deserialize;

use super::error::ConfigError;
use crate::audio::format::{SampleFormat, TargetFormat};
use crate::audio::mix::MAX_VOLUME;
use crate::sounds::DEFAULT_VOLUME;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: u16 = 2;
const DEFAULT_BITS_PER_SAMPLE: u16 = 16;
const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Prefix for environment overrides, e.g. SFXMIX_DEVICE=mock.
const ENV_PREFIX: &str = "SFXMIX";

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The output device (default: the host's default output).
    device: Option<String>,

    /// Target sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Number of output channels (default: 2)
    channels: Option<u16>,

    /// Target sample format (default: "int")
    sample_format: Option<String>,

    /// Target bits per sample (default: 16)
    bits_per_sample: Option<u16>,

    /// Device buffer size in frames (default: 4096)
    buffer_size: Option<usize>,

    /// Initial volume in [0, 128) (default: 64)
    volume: Option<i32>,

    /// Directory that relative sound names are resolved against.
    sound_path: Option<PathBuf>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            ..Default::default()
        }
    }

    /// Loads the configuration from an optional YAML file, then applies
    /// SFXMIX_* environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Audio, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        Ok(builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize::<Audio>()?)
    }

    /// Replaces the configured device, if one is given.
    pub fn with_device(mut self, device: Option<String>) -> Audio {
        if device.is_some() {
            self.device = device;
        }
        self
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the target sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    /// Returns the target sample format (default: Int)
    pub fn sample_format(&self) -> Result<SampleFormat, ConfigError> {
        match self.sample_format.as_deref() {
            Some(format) => Ok(SampleFormat::from_str(format)?),
            None => Ok(SampleFormat::Int),
        }
    }

    /// Returns the target bits per sample (default: 16)
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample.unwrap_or(DEFAULT_BITS_PER_SAMPLE)
    }

    /// Returns the device buffer size in frames (default: 4096)
    pub fn buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE).max(1)
    }

    /// Returns the initial volume, validated against [0, MAX_VOLUME).
    pub fn volume(&self) -> Result<i32, ConfigError> {
        match self.volume {
            Some(volume) if !(0..MAX_VOLUME).contains(&volume) => Err(ConfigError::Volume(volume)),
            Some(volume) => Ok(volume),
            None => Ok(DEFAULT_VOLUME),
        }
    }

    pub fn sound_path(&self) -> Option<&Path> {
        self.sound_path.as_deref()
    }

    /// Builds the validated output format.
    pub fn target_format(&self) -> Result<TargetFormat, ConfigError> {
        Ok(TargetFormat::new(
            self.sample_rate(),
            self.sample_format()?,
            self.bits_per_sample(),
            self.channels(),
        )?)
    }
}
