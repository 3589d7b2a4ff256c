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

//! The mixing engine.
//!
//! Owns the waveform store, the active cursors and the global volume. The
//! control surface (`load`, `play`, `stop_*`, volume) may be called from any
//! thread; `render_block` is called by the device's render thread.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::cursor::PlaybackCursor;
use super::error::{LoadError, RangeError};
use super::store::{Waveform, WaveformStore};
use crate::audio::decode::Decoder;
use crate::audio::format::{AudioSpec, FormatError, TargetFormat};
use crate::audio::mix::MAX_VOLUME;

/// Default volume: half of full scale.
pub const DEFAULT_VOLUME: i32 = MAX_VOLUME / 2;

/// Capacity reserved up front for the active set so `play` rarely grows it.
const ACTIVE_CAPACITY: usize = 64;

/// Finished cursors the render thread can hand back before the control side
/// reaps them. Past this, the render thread drops them itself.
const RETIRED_CAPACITY: usize = 1024;

pub struct MixEngine {
    /// The output format every waveform is converted to.
    target: TargetFormat,
    spec: AudioSpec,
    /// False when the device failed to open; the engine is then silent.
    usable: AtomicBool,
    /// Cursors currently producing audio, in start order. Shared by `play`
    /// (append) and `render_block` (mix and evict).
    active: Mutex<Vec<PlaybackCursor>>,
    /// Cursors evicted by `render_block`, freed on the control side so the
    /// render thread never releases their memory.
    retired_tx: Sender<PlaybackCursor>,
    retired_rx: Receiver<PlaybackCursor>,
    waveforms: WaveformStore,
    volume: AtomicI32,
}

impl MixEngine {
    /// Creates a usable engine producing `target`.
    pub fn new(target: TargetFormat, decoder: Box<dyn Decoder>) -> Result<Self, FormatError> {
        Self::build(target, decoder, true)
    }

    /// Creates an engine for a host without a working device. Loads still
    /// decode, but nothing plays and failures are swallowed.
    pub fn unusable(target: TargetFormat, decoder: Box<dyn Decoder>) -> Result<Self, FormatError> {
        Self::build(target, decoder, false)
    }

    fn build(
        target: TargetFormat,
        decoder: Box<dyn Decoder>,
        usable: bool,
    ) -> Result<Self, FormatError> {
        let spec = target.spec()?;
        info!(format = %target, usable, "Creating mix engine");
        let (retired_tx, retired_rx) = crossbeam_channel::bounded(RETIRED_CAPACITY);
        Ok(MixEngine {
            target,
            spec,
            usable: AtomicBool::new(usable),
            active: Mutex::new(Vec::with_capacity(ACTIVE_CAPACITY)),
            retired_tx,
            retired_rx,
            waveforms: WaveformStore::new(decoder, spec),
            volume: AtomicI32::new(DEFAULT_VOLUME),
        })
    }

    /// Loads (or fetches the cached) waveform for `name`. On an unusable
    /// engine, failures are logged and reported as `None`.
    pub fn load(&self, name: &str) -> Result<Option<Arc<Waveform>>, LoadError> {
        match self.waveforms.resolve(name) {
            Ok(waveform) => Ok(Some(waveform)),
            Err(e) if !self.is_usable() => {
                debug!(name, err = %e, "Ignoring load failure, audio is disabled");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Starts playing `name`, loading it first if needed. The returned cursor is
    /// a handle that can stop this instance. Returns `None` on an unusable
    /// engine.
    pub fn play(&self, name: &str, looping: bool) -> Result<Option<PlaybackCursor>, LoadError> {
        let Some(waveform) = self.load(name)? else {
            return Ok(None);
        };
        if !self.is_usable() {
            return Ok(None);
        }

        self.reap();
        let cursor = PlaybackCursor::new(waveform, looping);
        self.active.lock().push(cursor.clone());
        info!(name, looping, id = cursor.id(), "Playing sound");
        Ok(Some(cursor))
    }

    /// Stops every active cursor. They're evicted on the next render.
    pub fn stop_all(&self) {
        let count = {
            let active = self.active.lock();
            for cursor in active.iter() {
                cursor.stop();
            }
            active.len()
        };
        self.reap();
        debug!(count, "Stopped all sounds");
    }

    /// Stops every active cursor playing `name`. The sound is loaded if it
    /// hasn't been yet.
    pub fn stop_by_name(&self, name: &str) -> Result<(), LoadError> {
        let Some(waveform) = self.load(name)? else {
            return Ok(());
        };

        let mut stopped = 0;
        for cursor in self.active.lock().iter().filter(|c| c.plays(&waveform)) {
            cursor.stop();
            stopped += 1;
        }
        self.reap();
        debug!(name, stopped, "Stopped sound");
        Ok(())
    }

    /// Sets the global volume. Fails if `volume` is outside `[0, MAX_VOLUME)`.
    pub fn set_volume(&self, volume: i32) -> Result<(), RangeError> {
        if !(0..MAX_VOLUME).contains(&volume) {
            warn!(volume, "Volume out of range");
            return Err(RangeError { volume });
        }
        self.volume.store(volume, Ordering::Relaxed);
        Ok(())
    }

    /// Nudges the volume by `delta`, clamping into range. Returns the new volume.
    pub fn adjust_volume(&self, delta: i32) -> i32 {
        let clamp = |v: i32| v.saturating_add(delta).clamp(0, MAX_VOLUME - 1);
        let previous = self
            .volume
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(clamp(v)))
            .unwrap_or_else(|v| v);
        clamp(previous)
    }

    pub fn volume(&self) -> i32 {
        self.volume.load(Ordering::Relaxed)
    }

    /// Produces the next block of output into `dest`.
    ///
    /// Clears `dest` to silence, mixes every active cursor into it and drops the
    /// ones that finish. Never allocates or touches the disk.
    pub fn render_block(&self, dest: &mut [u8]) {
        dest.fill(self.spec.encoding.silence());
        if !self.is_usable() {
            return;
        }

        let volume = self.volume();
        self.active.lock().retain(|cursor| {
            if !cursor.mix(dest, volume) {
                return true;
            }
            // A full queue hands the clone back and it's dropped here.
            let _ = self.retired_tx.try_send(cursor.clone());
            false
        });
    }

    /// Frees cursors the render thread has evicted.
    fn reap(&self) {
        self.retired_rx.try_iter().for_each(drop);
    }

    #[cfg(test)]
    fn retired_count(&self) -> usize {
        self.retired_rx.len()
    }

    pub fn is_usable(&self) -> bool {
        self.usable.load(Ordering::Acquire)
    }

    /// Switches the engine to silent mode after its device failed. Anything
    /// already playing is stopped.
    pub fn disable(&self) {
        if self.usable.swap(false, Ordering::AcqRel) {
            warn!("Audio disabled, sounds will not play");
            self.stop_all();
        }
    }

    pub fn target_format(&self) -> &TargetFormat {
        &self.target
    }

    /// The byte layout `render_block` produces.
    pub fn spec(&self) -> AudioSpec {
        self.spec
    }

    /// Number of cursors in the active set, including stopped ones not yet
    /// evicted.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Number of cached waveforms.
    pub fn loaded_count(&self) -> usize {
        self.waveforms.len()
    }
}

impl Drop for MixEngine {
    fn drop(&mut self) {
        // Cursors hold references into the waveforms; release them first.
        self.active.get_mut().clear();
        self.reap();
        self.waveforms.clear();
        debug!("Mix engine torn down");
    }
}

impl std::fmt::Debug for MixEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixEngine")
            .field("target", &self.target)
            .field("usable", &self.is_usable())
            .field("volume", &self.volume())
            .field("active", &self.active_count())
            .field("waveforms", &self.waveforms)
            .finish()
    }
}
