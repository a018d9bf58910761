#![allow(dead_code)]

//! glow-rs - Audio-reactive PWM light controller
//!
//! Reads live audio input, follows its energy envelope, and drives a PWM
//! output (e.g. an LED driver) with the result. A remote controller can
//! switch between manual and audio-reactive mode and adjust sensitivity
//! over OSC/UDP while the audio keeps running.

mod actuator;
mod audio;
mod control;
mod dsp;
mod settings;

use std::sync::Arc;

use actuator::SysfsPwm;
use audio::AudioEngine;
use control::{ControlCell, ControlState, OscListener};
use settings::AppSettings;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    log::info!("Starting glow-rs");

    let settings = AppSettings::load();
    if !AppSettings::exists() {
        // First run: write the defaults so there is a file to edit.
        settings.save();
    }

    let pwm = SysfsPwm::new(
        settings.pwm_chip,
        settings.pwm_channel,
        settings.pwm_period_ns,
        settings.max_duty,
    )?;

    // The cell must hold its initial value before either thread starts.
    let cell = Arc::new(ControlCell::new(ControlState {
        mode: settings.startup_mode,
        level: settings.startup_level,
    }));

    let mut listener = OscListener::start(settings.osc_port, Arc::clone(&cell))?;
    let mut engine = AudioEngine::start(&settings, Arc::clone(&cell), Box::new(pwm))?;

    println!("Hit ENTER to stop.");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    // Stop the stream before the listener; the missed-input counter is
    // only read once the audio thread is gone.
    engine.stop();
    listener.stop();
    log::info!("Finished. Missed input buffers: {}", engine.missed_inputs());

    Ok(())
}
