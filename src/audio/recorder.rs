//! System microphone input via CPAL.
//!
//! Handles device enumeration, ordered device fallback, and format
//! conversion. Every stream is normalized to mono f32 frames at the device
//! rate; the monitor loop meters and encodes at that rate and only the
//! classification window gets resampled.

use super::dispatch::FrameDispatcher;
use crate::log_debug;
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Audio input device wrapper.
pub struct Recorder {
    device: cpal::Device,
}

impl Recorder {
    /// List microphone names so the CLI can expose a human-friendly selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Acquire an input device, walking an ordered candidate list: the
    /// configured device first, then the system default, then every other
    /// enumerated input. Each rejection is logged and the next candidate is
    /// tried; the error returned when the list is exhausted is fatal to the
    /// monitor session.
    pub fn acquire(preferred_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let mut candidates: Vec<cpal::Device> = Vec::new();

        if let Some(name) = preferred_device {
            let mut devices = host.input_devices().context("no input devices available")?;
            match devices.find(|d| d.name().map(|n| n == name).unwrap_or(false)) {
                Some(device) => candidates.push(device),
                None => log_debug(&format!(
                    "input device '{name}' not found; trying fallbacks"
                )),
            }
        }
        if let Some(device) = host.default_input_device() {
            candidates.push(device);
        }
        if let Ok(devices) = host.input_devices() {
            candidates.extend(devices);
        }

        let mut rejected: Vec<String> = Vec::new();
        for device in candidates {
            let name = device
                .name()
                .unwrap_or_else(|_| "unknown input device".to_string());
            if rejected.contains(&name) {
                continue;
            }
            match device.default_input_config() {
                Ok(_) => {
                    log_debug(&format!("monitor input device: {name}"));
                    return Ok(Self { device });
                }
                Err(err) => {
                    log_debug(&format!("input device '{name}' rejected: {err}"));
                    rejected.push(name);
                }
            }
        }

        Err(anyhow!(
            "no usable input device (rejected: {rejected:?}). {}",
            mic_permission_hint()
        ))
    }

    /// Name of the active input device.
    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    /// Open the input stream and start delivering fixed-size mono frames.
    ///
    /// The device callback normalizes every supported sample format to f32
    /// and hands frames to a bounded channel via `try_send`; a full channel
    /// or a contended dispatcher lock increments the dropped counter instead
    /// of blocking the callback.
    pub fn open_stream(&self, frame_ms: u64, channel_capacity: usize) -> Result<InputStream> {
        let default_config = self.device.default_input_config()?;
        let format = default_config.sample_format();
        let device_config: StreamConfig = default_config.clone().into();
        let sample_rate = device_config.sample_rate.0;
        let channels = usize::from(device_config.channels.max(1));
        let frame_ms = frame_ms.clamp(5, 120);
        let frame_samples = ((sample_rate as u64 * frame_ms) / 1000).max(1) as usize;
        let (sender, receiver) = bounded::<Vec<f32>>(channel_capacity.max(1));
        let dropped = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Mutex::new(FrameDispatcher::new(
            frame_samples,
            sender,
            dropped.clone(),
        )));

        log_debug(&format!(
            "input stream: format={format:?} sample_rate={sample_rate}Hz channels={channels} frame_ms={frame_ms}"
        ));

        // Keep the error callback quiet in the UI and mirror issues into the
        // log; a stream hiccup must not kill the monitor.
        let err_fn = |err| log_debug(&format!("audio_stream_error: {err}"));
        let stream = match format {
            SampleFormat::F32 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[f32], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| sample);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::I16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[i16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| sample as f32 / 32_768.0);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::U16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[u16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| {
                                (sample as f32 - 32_768.0) / 32_768.0
                            });
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            other => return Err(anyhow!("unsupported sample format: {other:?}")),
        };

        stream.play()?;

        Ok(InputStream {
            stream,
            frames: receiver,
            sample_rate,
            dropped,
        })
    }
}

/// A live input stream plus the frame channel it feeds.
///
/// `cpal::Stream` is not `Send`, so the stream must be opened and closed on
/// the thread that runs the monitor loop.
pub struct InputStream {
    stream: cpal::Stream,
    pub frames: Receiver<Vec<f32>>,
    pub sample_rate: u32,
    pub dropped: Arc<AtomicUsize>,
}

impl InputStream {
    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn close(self) {
        if let Err(err) = self.stream.pause() {
            log_debug(&format!("failed to pause audio stream: {err}"));
        }
        drop(self.stream);
    }
}

pub fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}
