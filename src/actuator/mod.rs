//! Actuator module - the PWM output the audio processor drives

mod sysfs;

pub use sysfs::{ActuatorError, SysfsPwm};

/// A hardware output that accepts a duty value each buffer.
///
/// Implementations must be synchronous and fast enough to complete
/// within one audio buffer period; the audio callback invokes
/// `write_duty` directly.
pub trait PwmWriter: Send {
    /// Largest duty value the device accepts; callers clamp to this.
    fn max_duty(&self) -> u32;

    /// Write one duty value. Must not block or allocate.
    fn write_duty(&mut self, duty: u32) -> std::io::Result<()>;
}

/// Test double recording every duty value written.
///
/// The recording is shared so a test can keep reading it after the mock
/// has been moved into a processor.
#[cfg(test)]
pub struct MockPwm {
    max_duty: u32,
    written: std::sync::Arc<std::sync::Mutex<Vec<u32>>>,
}

#[cfg(test)]
impl MockPwm {
    pub fn new(max_duty: u32) -> (Self, std::sync::Arc<std::sync::Mutex<Vec<u32>>>) {
        let written = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        (
            Self {
                max_duty,
                written: std::sync::Arc::clone(&written),
            },
            written,
        )
    }
}

#[cfg(test)]
impl PwmWriter for MockPwm {
    fn max_duty(&self) -> u32 {
        self.max_duty
    }

    fn write_duty(&mut self, duty: u32) -> std::io::Result<()> {
        self.written.lock().unwrap().push(duty);
        Ok(())
    }
}
