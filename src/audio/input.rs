//! Audio input capture
//!
//! Opens a cpal input stream on the configured device and drives the
//! buffer processor from the stream callback. Scratch buffers are
//! allocated up front and moved into the callback so the real-time
//! path never allocates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::processor::BufferProcessor;
use crate::actuator::PwmWriter;
use crate::control::ControlCell;
use crate::settings::AppSettings;

/// Errors that can occur while starting audio capture
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("input device not found: {0}")]
    DeviceNotFound(String),

    #[error("no default input device")]
    NoDefaultDevice,

    #[error("failed to query device config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build input stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("failed to start input stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// Running audio capture engine.
///
/// Owns the cpal stream; dropping or stopping it stops the callbacks.
pub struct AudioEngine {
    stream: Option<cpal::Stream>,
    missed_inputs: Arc<AtomicU64>,
}

impl AudioEngine {
    /// Open the configured input device and start the stream.
    ///
    /// Any failure here is startup-fatal; there is no retry.
    pub fn start(
        settings: &AppSettings,
        cell: Arc<ControlCell>,
        pwm: Box<dyn PwmWriter>,
    ) -> Result<Self, AudioError> {
        let host = cpal::default_host();

        let device = match &settings.input_device {
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| AudioError::DeviceNotFound(name.clone()))?,
            None => host
                .default_input_device()
                .ok_or(AudioError::NoDefaultDevice)?,
        };
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using input device: {}", device_name);

        let default_config = device.default_input_config()?;
        let sample_format = default_config.sample_format();
        let channels = default_config.channels() as usize;

        let config = cpal::StreamConfig {
            channels: channels as u16,
            sample_rate: cpal::SampleRate(settings.sample_rate),
            buffer_size: if settings.buffer_frames == 0 {
                cpal::BufferSize::Default
            } else {
                cpal::BufferSize::Fixed(settings.buffer_frames)
            },
        };
        log::info!("Audio config: {:?} ({:?})", config, sample_format);

        let missed_inputs = Arc::new(AtomicU64::new(0));
        let mut processor =
            BufferProcessor::new(cell, pwm, channels, Arc::clone(&missed_inputs));

        // Preallocate generously; callbacks only shrink into this.
        let scratch_samples = if settings.buffer_frames == 0 {
            4096 * channels
        } else {
            settings.buffer_frames as usize * channels
        };
        let mut out_scratch = vec![0.0f32; scratch_samples];

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if out_scratch.len() < data.len() {
                        out_scratch.resize(data.len(), 0.0);
                    }
                    let frames = data.len() / channels;
                    let _ = processor.process(Some(data), &mut out_scratch[..data.len()], frames);
                },
                |err| log::error!("Audio error: {}", err),
                None,
            )?,
            cpal::SampleFormat::I16 => {
                let mut in_scratch: Vec<f32> = Vec::with_capacity(scratch_samples);
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        in_scratch.clear();
                        in_scratch.extend(data.iter().map(|&s| s as f32 / 32768.0));
                        if out_scratch.len() < data.len() {
                            out_scratch.resize(data.len(), 0.0);
                        }
                        let frames = data.len() / channels;
                        let _ = processor.process(
                            Some(&in_scratch),
                            &mut out_scratch[..data.len()],
                            frames,
                        );
                    },
                    |err| log::error!("Audio error: {}", err),
                    None,
                )?
            }
            format => return Err(AudioError::UnsupportedFormat(format)),
        };

        stream.play()?;
        log::info!("Audio stream started");

        Ok(Self {
            stream: Some(stream),
            missed_inputs,
        })
    }

    /// Stop the stream; no more callbacks run after this returns.
    pub fn stop(&mut self) {
        self.stream = None;
        log::info!("Audio stream stopped");
    }

    /// Number of buffer periods with no captured input.
    ///
    /// Meaningful once the stream has been stopped; the counter is
    /// written only by the audio thread.
    pub fn missed_inputs(&self) -> u64 {
        self.missed_inputs.load(Ordering::Relaxed)
    }
}
