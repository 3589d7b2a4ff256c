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

//! Sound effect playback.
//!
//! This module provides:
//! - Waveform loading and caching (converted once to the output format)
//! - Playback cursors for one-shot and looping instances
//! - The mix engine that renders active cursors into device blocks

mod cursor;
mod engine;
mod error;
mod store;

pub use cursor::{PlaybackCursor, PlaybackState};
pub use engine::{MixEngine, DEFAULT_VOLUME};
pub use error::{LoadError, RangeError};
pub use store::{Waveform, WaveformStore};
