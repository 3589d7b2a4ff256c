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
use std::{fmt, sync::Arc};

use crate::config;
use crate::sounds::MixEngine;

pub mod convert;
pub mod cpal;
pub mod decode;
mod error;
pub mod format;
pub mod mix;
pub mod mock;
pub mod thread_priority;

pub use error::DeviceInitError;
pub use format::{SampleFormat, TargetFormat};

/// An output device that drives a mix engine's render path at its buffer
/// cadence.
pub trait Device: fmt::Display + Send + Sync {
    /// The format the device was opened with.
    fn target_format(&self) -> &TargetFormat;

    /// Starts calling `engine.render_block` on the device's render thread.
    fn start(&self, engine: Arc<MixEngine>) -> Result<(), DeviceInitError>;

    /// Halts (or resumes) render calls. While paused the device outputs
    /// silence.
    fn pause(&self, paused: bool);

    fn is_paused(&self) -> bool;

    #[cfg(test)]
    fn to_mock(&self) -> Option<&mock::Device>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, DeviceInitError> {
    cpal::Device::list()
}

/// Opens the configured device with the given format. Device names beginning
/// with "mock" get a mock device.
pub fn get_device(
    config: &config::Audio,
    target_format: TargetFormat,
) -> Result<Box<dyn Device>, DeviceInitError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Box::new(mock::Device::get(
            device,
            target_format,
            config.buffer_size(),
        )));
    };

    Ok(Box::new(cpal::Device::get(config, target_format)?))
}
