//! Real-time per-buffer processing
//!
//! Invoked once per fixed-size buffer by the audio device; must complete
//! within one buffer period. The hot path does no blocking I/O, no
//! allocation, and takes no lock that a non-real-time thread could hold:
//! the only shared state it touches is the control cell's lock-free
//! snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::actuator::PwmWriter;
use crate::control::{ControlCell, Mode};
use crate::dsp::EnvelopeFollower;

/// Fixed scale from envelope space to the duty range.
pub const ACTUATOR_SCALE: f32 = 1024.0;

/// Returned by [`BufferProcessor::process`]; the stream keeps running
/// until it is stopped externally, never from inside the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum ProcessStatus {
    Continue,
}

/// Per-buffer processor owning the envelope state and the actuator.
///
/// Exactly one instance exists, moved into the audio callback. The
/// missed-input counter is written only from here; its read side is
/// meant to be consulted after the stream has been stopped.
pub struct BufferProcessor {
    cell: Arc<ControlCell>,
    envelope: EnvelopeFollower,
    pwm: Box<dyn PwmWriter>,
    channels: usize,
    missed_inputs: Arc<AtomicU64>,
    /// One-shot so a failing PWM device doesn't flood the log from the
    /// real-time thread.
    write_error_logged: bool,
}

impl BufferProcessor {
    pub fn new(
        cell: Arc<ControlCell>,
        pwm: Box<dyn PwmWriter>,
        channels: usize,
        missed_inputs: Arc<AtomicU64>,
    ) -> Self {
        Self {
            cell,
            envelope: EnvelopeFollower::new(),
            pwm,
            channels,
            missed_inputs,
            write_error_logged: false,
        }
    }

    /// Process one buffer: snapshot control state, derive the raw
    /// amplitude sum, advance the envelope, write the actuator duty.
    ///
    /// `input` is `None` when the device captured nothing this period;
    /// the output buffer is then filled with silence and the missed
    /// counter incremented. Mode switches never reset the envelope.
    pub fn process(
        &mut self,
        input: Option<&[f32]>,
        output: &mut [f32],
        frames: usize,
    ) -> ProcessStatus {
        let state = self.cell.snapshot();

        let raw_sum = if state.mode == Mode::Manual {
            // Bypass: constant drive scaled by level, audio ignored.
            1.0
        } else {
            match input {
                None => {
                    for sample in output.iter_mut() {
                        *sample = 0.0;
                    }
                    self.missed_inputs.fetch_add(1, Ordering::Relaxed);
                    0.0
                }
                Some(data) => {
                    // Signed sum of channel 0. Deliberately not RMS and
                    // not absolute-valued; cancellation is part of the
                    // response curve.
                    data.chunks(self.channels)
                        .take(frames)
                        .map(|frame| frame[0])
                        .sum()
                }
            }
        };

        let envelope = self.envelope.process(raw_sum);

        let duty = (envelope * state.level * ACTUATOR_SCALE).abs().round() as u32;
        let duty = duty.min(self.pwm.max_duty());

        if let Err(e) = self.pwm.write_duty(duty) {
            if !self.write_error_logged {
                log::error!("PWM write failed (further errors suppressed): {}", e);
                self.write_error_logged = true;
            }
        }

        ProcessStatus::Continue
    }
}
