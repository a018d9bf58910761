//! Decay-limited envelope follower
//!
//! Tracks the per-buffer amplitude sum with an asymmetric response:
//! rising energy is tracked instantly (unbounded attack), falling energy
//! is released at a fixed step per buffer (bounded decay). The slow
//! release smooths transient dropouts so the actuator doesn't flicker.

/// Maximum amount the envelope may fall between two consecutive buffers.
pub const DECAY_STEP: f32 = 0.03;

/// Per-buffer envelope follower with instant attack and bounded decay.
///
/// Owned exclusively by the audio thread; holds one scalar of state
/// (the previous envelope value, seeded at 0) which is never reset for
/// the life of the stream.
#[derive(Debug)]
pub struct EnvelopeFollower {
    prev: f32,
}

impl EnvelopeFollower {
    pub fn new() -> Self {
        Self { prev: 0.0 }
    }

    /// Advance the envelope by one buffer.
    ///
    /// If `raw_sum` is below the previous envelope, the output falls by
    /// exactly [`DECAY_STEP`]; otherwise it jumps to `raw_sum`. The new
    /// value becomes the state for the next call.
    #[inline]
    pub fn process(&mut self, raw_sum: f32) -> f32 {
        let envelope = if raw_sum < self.prev {
            self.prev - DECAY_STEP
        } else {
            raw_sum
        };
        self.prev = envelope;
        envelope
    }

    /// The envelope value after the most recent `process` call.
    pub fn value(&self) -> f32 {
        self.prev
    }
}

impl Default for EnvelopeFollower {
    fn default() -> Self {
        Self::new()
    }
}
