//! Control module - shared control state and the OSC listener
//!
//! This module provides:
//! - The atomically-published `{mode, level}` control state
//! - The OSC-over-UDP listener thread that updates it

mod osc;
mod state;

pub use osc::{ListenerError, OscListener, MODE_ADDR, LEVEL_ADDR};
pub use state::{ControlCell, ControlState, Mode};
