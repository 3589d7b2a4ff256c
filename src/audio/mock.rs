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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use tracing::{info, span, Level};

use super::error::DeviceInitError;
use super::format::TargetFormat;
use crate::sounds::MixEngine;

/// The running render thread.
struct RenderThread {
    stop_tx: Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// A mock device. Renders blocks at the real cadence but discards them, keeping
/// only the most recent one for inspection.
pub struct Device {
    name: String,
    target_format: TargetFormat,
    /// Block size in frames.
    buffer_size: usize,
    paused: Arc<AtomicBool>,
    blocks_rendered: Arc<AtomicU64>,
    last_block: Arc<Mutex<Vec<u8>>>,
    render: Mutex<Option<RenderThread>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, target_format: TargetFormat, buffer_size: usize) -> Device {
        Device {
            name: name.to_string(),
            target_format,
            buffer_size: buffer_size.max(1),
            paused: Arc::new(AtomicBool::new(false)),
            blocks_rendered: Arc::new(AtomicU64::new(0)),
            last_block: Arc::new(Mutex::new(Vec::new())),
            render: Mutex::new(None),
        }
    }

    /// Time between two render calls.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.buffer_size as f64 / self.target_format.sample_rate as f64)
    }

    /// Returns the number of blocks rendered so far.
    pub fn blocks_rendered(&self) -> u64 {
        self.blocks_rendered.load(Ordering::Acquire)
    }

    /// Returns a copy of the most recently rendered block.
    pub fn last_block(&self) -> Vec<u8> {
        self.last_block.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.render.lock().is_some()
    }
}

impl crate::audio::Device for Device {
    fn target_format(&self) -> &TargetFormat {
        &self.target_format
    }

    /// Spawns a thread calling `render_block` once per period.
    fn start(&self, engine: Arc<MixEngine>) -> Result<(), DeviceInitError> {
        let span = span!(Level::INFO, "start device (mock)");
        let _enter = span.enter();

        let mut render = self.render.lock();
        if render.is_some() {
            return Err(DeviceInitError::AlreadyStarted(self.name.clone()));
        }

        let block_len = self.buffer_size * engine.spec().bytes_per_frame();
        *self.last_block.lock() = vec![engine.spec().encoding.silence(); block_len];

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let period = self.period();
        let paused = self.paused.clone();
        let blocks_rendered = self.blocks_rendered.clone();
        let last_block = self.last_block.clone();
        let handle = thread::Builder::new()
            .name("sfxmix-mock".to_string())
            .spawn(move || {
                render_loop(
                    engine,
                    period,
                    block_len,
                    paused,
                    blocks_rendered,
                    last_block,
                    stop_rx,
                )
            })?;

        info!(
            device = self.name,
            format = %self.target_format,
            period = format!("{:?}", period),
            "Mock output started"
        );
        *render = Some(RenderThread { stop_tx, handle });
        Ok(())
    }

    fn pause(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
        info!(device = self.name, paused, "Output paused state changed");
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    #[cfg(test)]
    fn to_mock(&self) -> Option<&Device> {
        Some(self)
    }
}

fn render_loop(
    engine: Arc<MixEngine>,
    period: Duration,
    block_len: usize,
    paused: Arc<AtomicBool>,
    blocks_rendered: Arc<AtomicU64>,
    last_block: Arc<Mutex<Vec<u8>>>,
    stop_rx: Receiver<()>,
) {
    let mut block = vec![0u8; block_len];
    loop {
        spin_sleep::sleep(period);
        match stop_rx.try_recv() {
            Err(TryRecvError::Empty) => {}
            _ => break,
        }
        if paused.load(Ordering::Acquire) {
            continue;
        }

        engine.render_block(&mut block);
        last_block.lock().copy_from_slice(&block);
        blocks_rendered.fetch_add(1, Ordering::AcqRel);
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(render) = self.render.get_mut().take() {
            let _ = render.stop_tx.send(());
            let _ = render.handle.join();
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
