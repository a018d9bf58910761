//! DSP module - per-buffer signal analysis

mod envelope;

pub use envelope::{EnvelopeFollower, DECAY_STEP};
