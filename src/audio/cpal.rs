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
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{error, info, span, warn, Level};

use super::error::DeviceInitError;
use super::format::{SampleEncoding, TargetFormat};
use super::thread_priority;
use crate::{audio::Device as AudioDevice, config, sounds::MixEngine};

/// Commands sent from the control side to the output thread.
enum Command {
    Pause(bool),
    Shutdown,
}

/// The running output thread and the channel used to drive it.
struct OutputThread {
    command_tx: Sender<Command>,
    handle: thread::JoinHandle<()>,
}

/// A small wrapper around a cpal::Device that renders a mix engine into it.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The format the stream is opened with.
    target_format: TargetFormat,
    /// Requested buffer size in frames.
    buffer_size: usize,
    /// Whether the device accepts `buffer_size` as a fixed period.
    fixed_buffer: bool,
    /// Checked by the callback; while set it writes silence without rendering.
    paused: Arc<AtomicBool>,
    /// The output thread, once started.
    output: Mutex<Option<OutputThread>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, DeviceInitError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal output devices.
    fn list_cpal_devices() -> Result<Vec<Device>, DeviceInitError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device::new(
                        device.name()?,
                        max_channels,
                        host_id,
                        device,
                        TargetFormat::default(),
                        0,
                    ));
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    fn new(
        name: String,
        max_channels: u16,
        host_id: cpal::HostId,
        device: cpal::Device,
        target_format: TargetFormat,
        buffer_size: usize,
    ) -> Device {
        Device {
            name,
            max_channels,
            host_id,
            device,
            target_format,
            buffer_size,
            fixed_buffer: false,
            paused: Arc::new(AtomicBool::new(false)),
            output: Mutex::new(None),
        }
    }

    /// Gets the configured cpal device. "default" picks the default host's
    /// default output.
    pub fn get(
        config: &config::Audio,
        target_format: TargetFormat,
    ) -> Result<Device, DeviceInitError> {
        let name = config.device();

        let mut device = if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| DeviceInitError::NotFound(name.to_string()))?;
            let max_channels = device
                .supported_output_configs()?
                .map(|config| config.channels())
                .max()
                .unwrap_or(0);
            Device::new(
                device.name()?,
                max_channels,
                host.id(),
                device,
                TargetFormat::default(),
                0,
            )
        } else {
            Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| DeviceInitError::NotFound(name.to_string()))?
        };

        device.target_format = target_format;
        device.buffer_size = config.buffer_size();
        device.fixed_buffer = device.check_supported()?;
        Ok(device)
    }

    /// Fails unless the device advertises a config matching the target format.
    /// Returns whether the configured buffer size can be used as a fixed period.
    fn check_supported(&self) -> Result<bool, DeviceInitError> {
        let sample_format = cpal_sample_format(self.target_format.encoding()?);
        let rate = cpal::SampleRate(self.target_format.sample_rate);
        let frames = u32::try_from(self.buffer_size).unwrap_or(u32::MAX);

        let matching: Vec<cpal::SupportedStreamConfigRange> = self
            .device
            .supported_output_configs()?
            .filter(|range| {
                range.channels() == self.target_format.channels
                    && range.sample_format() == sample_format
                    && range.min_sample_rate() <= rate
                    && rate <= range.max_sample_rate()
            })
            .collect();
        if matching.is_empty() {
            return Err(DeviceInitError::UnsupportedConfig {
                device: self.name.clone(),
                format: self.target_format.clone(),
            });
        }

        let fixed = matching.iter().any(|range| match range.buffer_size() {
            cpal::SupportedBufferSize::Range { min, max } => (*min..=*max).contains(&frames),
            cpal::SupportedBufferSize::Unknown => false,
        });
        if !fixed {
            warn!(
                device = self.name,
                buffer_size = self.buffer_size,
                "Buffer size not supported, using the host default"
            );
        }
        Ok(fixed)
    }

    fn stream_config(&self) -> cpal::StreamConfig {
        let buffer_size = match u32::try_from(self.buffer_size) {
            Ok(frames) if self.fixed_buffer => cpal::BufferSize::Fixed(frames),
            _ => cpal::BufferSize::Default,
        };
        cpal::StreamConfig {
            channels: self.target_format.channels,
            sample_rate: cpal::SampleRate(self.target_format.sample_rate),
            buffer_size,
        }
    }
}

impl AudioDevice for Device {
    fn target_format(&self) -> &TargetFormat {
        &self.target_format
    }

    /// Starts the output thread. The cpal stream is created inside the thread
    /// and lives there until the device is dropped.
    fn start(&self, engine: Arc<MixEngine>) -> Result<(), DeviceInitError> {
        let span = span!(Level::INFO, "start device (cpal)");
        let _enter = span.enter();

        let mut output = self.output.lock();
        if output.is_some() {
            return Err(DeviceInitError::AlreadyStarted(self.name.clone()));
        }

        let encoding = self.target_format.encoding()?;
        let config = self.stream_config();
        let scratch_len = self.buffer_size.max(1) * engine.spec().bytes_per_frame();
        let device = self.device.clone();
        let paused = self.paused.clone();

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (command_tx, command_rx) = crossbeam_channel::unbounded();

        let handle = thread::Builder::new()
            .name("sfxmix-output".to_string())
            .spawn(move || {
                let stream =
                    build_stream(&device, &config, encoding, engine, paused, scratch_len);
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                run_output_thread(stream, command_rx);
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(DeviceInitError::OutputThread(self.name.clone()));
            }
        }

        info!(
            device = self.name,
            format = %self.target_format,
            buffer_size = self.buffer_size,
            "Output stream started"
        );
        *output = Some(OutputThread { command_tx, handle });
        Ok(())
    }

    fn pause(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
        if let Some(output) = self.output.lock().as_ref() {
            let _ = output.command_tx.send(Command::Pause(paused));
        }
        info!(device = self.name, paused, "Output paused state changed");
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    #[cfg(test)]
    fn to_mock(&self) -> Option<&super::mock::Device> {
        None
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(output) = self.output.get_mut().take() {
            let _ = output.command_tx.send(Command::Shutdown);
            if output.handle.join().is_err() {
                error!(device = self.name, "Output thread panicked");
            }
        }
    }
}

/// Holds the stream alive and applies commands until shutdown.
fn run_output_thread(stream: cpal::Stream, command_rx: Receiver<Command>) {
    for command in command_rx.iter() {
        match command {
            Command::Pause(true) => {
                if let Err(e) = stream.pause() {
                    warn!(err = %e, "Unable to pause output stream");
                }
            }
            Command::Pause(false) => {
                if let Err(e) = stream.play() {
                    warn!(err = %e, "Unable to resume output stream");
                }
            }
            Command::Shutdown => break,
        }
    }
    info!("Output stream closed");
}

fn cpal_sample_format(encoding: SampleEncoding) -> cpal::SampleFormat {
    match encoding {
        SampleEncoding::U8 => cpal::SampleFormat::U8,
        SampleEncoding::S16 => cpal::SampleFormat::I16,
        SampleEncoding::S32 => cpal::SampleFormat::I32,
        SampleEncoding::F32 => cpal::SampleFormat::F32,
    }
}

/// Builds and starts the output stream for the engine's encoding.
fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    encoding: SampleEncoding,
    engine: Arc<MixEngine>,
    paused: Arc<AtomicBool>,
    scratch_len: usize,
) -> Result<cpal::Stream, DeviceInitError> {
    let stream = match encoding {
        SampleEncoding::U8 => create_stream(device, config, engine, paused, scratch_len, |b| b[0]),
        SampleEncoding::S16 => create_stream(device, config, engine, paused, scratch_len, |b| {
            i16::from_le_bytes([b[0], b[1]])
        }),
        SampleEncoding::S32 => create_stream(device, config, engine, paused, scratch_len, |b| {
            i32::from_le_bytes([b[0], b[1], b[2], b[3]])
        }),
        SampleEncoding::F32 => create_stream(device, config, engine, paused, scratch_len, |b| {
            f32::from_le_bytes([b[0], b[1], b[2], b[3]])
        }),
    }?;
    stream.play()?;
    Ok(stream)
}

/// Creates a stream whose callback renders the engine into a scratch byte
/// buffer and copies it out as `T`.
fn create_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    engine: Arc<MixEngine>,
    paused: Arc<AtomicBool>,
    scratch_len: usize,
    read: fn(&[u8]) -> T,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let mut scratch = vec![0u8; scratch_len];
    let priority = thread_priority::render_thread_priority();
    let rt_audio = thread_priority::rt_audio_enabled();
    let mut priority_set = false;

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            thread_priority::configure_render_thread_priority(priority, rt_audio, &mut priority_set);

            if paused.load(Ordering::Acquire) {
                data.fill(T::EQUILIBRIUM);
                return;
            }
            render_into(&engine, &mut scratch, data, read);
        },
        |err| error!(err = %err, "Output stream error"),
        None,
    )
}

/// Renders the engine into `data`, at most `scratch.len()` bytes at a time.
/// Hosts may ask for a longer period than the buffer size; the period is then
/// rendered as several consecutive blocks.
fn render_into<T>(engine: &MixEngine, scratch: &mut [u8], data: &mut [T], read: fn(&[u8]) -> T) {
    let bytes_per_sample = std::mem::size_of::<T>();
    let samples_per_block = (scratch.len() / bytes_per_sample).max(1);
    for out in data.chunks_mut(samples_per_block) {
        let block = &mut scratch[..out.len() * bytes_per_sample];
        engine.render_block(block);
        for (sample, bytes) in out.iter_mut().zip(block.chunks_exact(bytes_per_sample)) {
            *sample = read(bytes);
        }
    }
}
