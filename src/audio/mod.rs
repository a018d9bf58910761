//! Audio module - real-time buffer processing and device wiring
//!
//! This module provides:
//! - The per-buffer processor that turns samples into an actuator duty
//! - cpal input stream setup driving that processor

mod input;
mod processor;

pub use input::{AudioEngine, AudioError};
pub use processor::{BufferProcessor, ProcessStatus, ACTUATOR_SCALE};
