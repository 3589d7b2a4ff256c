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
use crate::audio::convert::ConversionError;
use crate::audio::decode::DecodeError;
use crate::audio::mix::MAX_VOLUME;

/// A sound could not be turned into a waveform. Always names the source.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Unable to load sound file {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: DecodeError,
    },

    #[error("Unable to convert sound {name}: {source}")]
    Convert {
        name: String,
        #[source]
        source: ConversionError,
    },
}

impl LoadError {
    /// The source name that failed to load.
    pub fn name(&self) -> &str {
        match self {
            LoadError::Decode { name, .. } | LoadError::Convert { name, .. } => name,
        }
    }
}

/// A volume outside `[0, MAX_VOLUME)` was requested.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Volume {volume} out of range [0, {max})", max = MAX_VOLUME)]
pub struct RangeError {
    pub volume: i32,
}
