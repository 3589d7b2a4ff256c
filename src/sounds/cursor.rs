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

//! Playback cursors.
//!
//! A cursor is one playing instance of a waveform. The render thread advances
//! it through [`PlaybackCursor::mix`], while any other thread may call
//! [`PlaybackCursor::stop`] through a cloned handle without taking a lock.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use super::store::Waveform;
use crate::audio::mix::mix_audio;

/// Global cursor ID counter.
static NEXT_CURSOR_ID: AtomicU64 = AtomicU64::new(1);

const STARTED: u8 = 0;
const PLAYING: u8 = 1;
const FINISHED: u8 = 2;

/// Lifecycle of a cursor as observed by the render thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Queued but not mixed yet.
    Started,
    /// Mixed at least once and still producing audio.
    Playing,
    /// Exhausted or stopped. The engine drops it on the next render.
    Finished,
}

struct CursorInner {
    id: u64,
    waveform: Arc<Waveform>,
    /// Byte offset into the waveform, 0 <= position <= len.
    position: AtomicUsize,
    looping: AtomicBool,
    state: AtomicU8,
}

/// A handle to a single playing instance of a waveform.
#[derive(Clone)]
pub struct PlaybackCursor {
    inner: Arc<CursorInner>,
}

impl PlaybackCursor {
    /// Creates a cursor at the start of `waveform`.
    pub fn new(waveform: Arc<Waveform>, looping: bool) -> Self {
        PlaybackCursor {
            inner: Arc::new(CursorInner {
                id: NEXT_CURSOR_ID.fetch_add(1, Ordering::Relaxed),
                waveform,
                position: AtomicUsize::new(0),
                looping: AtomicBool::new(looping),
                state: AtomicU8::new(STARTED),
            }),
        }
    }

    /// Mixes the next `dest.len()` bytes of the waveform into `dest` at
    /// `volume` and advances. Returns true once the cursor is finished.
    ///
    /// A one-shot cursor mixes at most the remaining bytes and leaves the rest
    /// of `dest` alone. A looping cursor fills all of `dest`, wrapping to the
    /// start of the waveform as many times as needed.
    ///
    /// Must only be called from one thread at a time (the render thread).
    pub fn mix(&self, dest: &mut [u8], volume: i32) -> bool {
        let inner = &self.inner;
        if inner.state.load(Ordering::Acquire) == FINISHED {
            return true;
        }

        let samples = inner.waveform.samples();
        let len = samples.len();
        let encoding = inner.waveform.spec().encoding;

        let start = inner.position.load(Ordering::Acquire);
        let looping = inner.looping.load(Ordering::Acquire);
        if start >= len {
            // Stopped, or an empty waveform.
            return self.finish();
        }

        let end = if looping {
            let mut position = start;
            let mut written = 0;
            while written < dest.len() {
                let count = (dest.len() - written).min(len - position);
                mix_audio(
                    &mut dest[written..written + count],
                    &samples[position..position + count],
                    encoding,
                    volume,
                );
                written += count;
                position += count;
                if position == len {
                    position = 0;
                }
            }
            position
        } else {
            let count = dest.len().min(len - start);
            mix_audio(
                &mut dest[..count],
                &samples[start..start + count],
                encoding,
                volume,
            );
            start + count
        };

        // A concurrent stop() moves the position to the end. If that happened
        // while mixing, the stop wins.
        if inner
            .position
            .compare_exchange(start, end, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return self.finish();
        }

        if !looping && end >= len {
            return self.finish();
        }

        let _ = inner.state.compare_exchange(
            STARTED,
            PLAYING,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        false
    }

    /// Stops the cursor by clearing the loop flag and fast-forwarding it to the
    /// end. The next mix reports it finished. Safe to call from any thread.
    pub fn stop(&self) {
        self.inner.looping.store(false, Ordering::Release);
        self.inner
            .position
            .store(self.inner.waveform.len(), Ordering::Release);
    }

    fn finish(&self) -> bool {
        self.inner.state.store(FINISHED, Ordering::Release);
        true
    }

    /// Gets the cursor's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn state(&self) -> PlaybackState {
        match self.inner.state.load(Ordering::Acquire) {
            STARTED => PlaybackState::Started,
            PLAYING => PlaybackState::Playing,
            _ => PlaybackState::Finished,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state() == PlaybackState::Finished
    }

    /// Current byte offset into the waveform.
    pub fn position(&self) -> usize {
        self.inner.position.load(Ordering::Acquire)
    }

    pub fn is_looping(&self) -> bool {
        self.inner.looping.load(Ordering::Acquire)
    }

    pub fn waveform(&self) -> &Arc<Waveform> {
        &self.inner.waveform
    }

    /// Returns true if this cursor plays `waveform`.
    pub fn plays(&self, waveform: &Arc<Waveform>) -> bool {
        Arc::ptr_eq(&self.inner.waveform, waveform)
    }

    /// Returns true if both cursors play the same waveform.
    pub fn same_sound(&self, other: &PlaybackCursor) -> bool {
        self.plays(&other.inner.waveform)
    }
}

impl fmt::Debug for PlaybackCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackCursor")
            .field("id", &self.id())
            .field("sound", &self.inner.waveform.name())
            .field("position", &self.position())
            .field("len", &self.inner.waveform.len())
            .field("looping", &self.is_looping())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::{AudioSpec, SampleEncoding};
    use crate::audio::mix::MAX_VOLUME;

    /// A waveform of `len` bytes that are all 0x01, so every S16 sample mixes
    /// to 0x0101 at full volume.
    fn waveform(name: &str, len: usize) -> Arc<Waveform> {
        Arc::new(Waveform::new(
            name,
            AudioSpec::new(44100, 2, SampleEncoding::S16),
            vec![1; len],
        ))
    }

    #[test]
    fn test_one_shot_blocks() {
        let cursor = PlaybackCursor::new(waveform("blip", 1000), false);
        assert_eq!(cursor.state(), PlaybackState::Started);

        let mut dest = vec![0u8; 400];
        assert!(!cursor.mix(&mut dest, MAX_VOLUME));
        assert_eq!(cursor.position(), 400);
        assert_eq!(cursor.state(), PlaybackState::Playing);
        assert!(dest.iter().all(|&b| b == 1));

        let mut dest = vec![0u8; 400];
        assert!(!cursor.mix(&mut dest, MAX_VOLUME));
        assert_eq!(cursor.position(), 800);

        let mut dest = vec![0u8; 400];
        assert!(cursor.mix(&mut dest, MAX_VOLUME));
        assert_eq!(cursor.position(), 1000);
        assert!(dest[..200].iter().all(|&b| b == 1));
        assert!(dest[200..].iter().all(|&b| b == 0));
        assert_eq!(cursor.state(), PlaybackState::Finished);
    }

    #[test]
    fn test_one_shot_finishes_after_ceil_blocks() {
        for (len, block) in [(1000, 400), (1000, 250), (1000, 1000), (1000, 4096), (6, 4)] {
            let cursor = PlaybackCursor::new(waveform("blip", len), false);
            let mut dest = vec![0u8; block];
            let mut calls = 0;
            let mut mixed = 0;
            loop {
                calls += 1;
                let before = cursor.position();
                let finished = cursor.mix(&mut dest, MAX_VOLUME);
                mixed += cursor.position() - before;
                assert_eq!(finished, mixed == len, "len {} block {}", len, block);
                if finished {
                    break;
                }
            }
            assert_eq!(calls, len.div_ceil(block), "len {} block {}", len, block);
        }
    }

    #[test]
    fn test_loop_wraps_within_one_block() {
        let cursor = PlaybackCursor::new(waveform("hum", 300), true);
        let mut dest = vec![0u8; 700];

        assert!(!cursor.mix(&mut dest, MAX_VOLUME));

        assert_eq!(cursor.position(), 100);
        assert!(dest.iter().all(|&b| b == 1));
        assert!(!cursor.is_finished());
    }

    #[test]
    fn test_loop_never_finishes() {
        let cursor = PlaybackCursor::new(waveform("hum", 300), true);
        let mut dest = vec![0u8; 128];
        for _ in 0..100 {
            assert!(!cursor.mix(&mut dest, MAX_VOLUME));
        }
        assert_eq!(cursor.position(), (100 * 128) % 300);
    }

    #[test]
    fn test_stop_finishes_silently() {
        for looping in [false, true] {
            let cursor = PlaybackCursor::new(waveform("blip", 1000), looping);
            let mut dest = vec![0u8; 400];
            assert!(!cursor.mix(&mut dest, MAX_VOLUME));

            let handle = cursor.clone();
            handle.stop();
            assert!(!cursor.is_looping());

            let mut dest = vec![0u8; 400];
            assert!(cursor.mix(&mut dest, MAX_VOLUME));
            assert!(dest.iter().all(|&b| b == 0));
            assert_eq!(handle.state(), PlaybackState::Finished);

            // Stays finished.
            assert!(cursor.mix(&mut dest, MAX_VOLUME));
            assert!(dest.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_empty_waveform_finishes_immediately() {
        for looping in [false, true] {
            let cursor = PlaybackCursor::new(waveform("empty", 0), looping);
            let mut dest = vec![0u8; 16];
            assert!(cursor.mix(&mut dest, MAX_VOLUME));
            assert!(dest.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_same_sound() {
        let laser = waveform("laser", 100);
        let a = PlaybackCursor::new(laser.clone(), false);
        let b = PlaybackCursor::new(laser.clone(), true);
        let c = PlaybackCursor::new(waveform("laser", 100), false);

        assert!(a.same_sound(&b));
        assert!(a.plays(&laser));
        assert!(!a.same_sound(&c));
        assert_ne!(a.id(), b.id());
    }
}
