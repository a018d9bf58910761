//! Linux sysfs PWM output
//!
//! Drives a hardware PWM channel through `/sys/class/pwm`. The channel
//! is exported and configured once at startup; after that, each duty
//! write is a single `write` to the already-open `duty_cycle` attribute
//! so the audio callback never re-opens files or allocates.

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::PwmWriter;

/// Errors that can occur during PWM setup
#[derive(Error, Debug)]
pub enum ActuatorError {
    #[error("PWM chip not found at {0}")]
    ChipNotFound(PathBuf),

    #[error("failed to export PWM channel {channel}: {source}")]
    Export {
        channel: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to configure {attr}: {source}")]
    Configure {
        attr: String,
        #[source]
        source: io::Error,
    },
}

/// A PWM channel exposed via the Linux sysfs interface.
pub struct SysfsPwm {
    duty_file: File,
    period_ns: u32,
    max_duty: u32,
    /// Reusable formatting buffer so duty writes don't allocate.
    buf: String,
}

impl SysfsPwm {
    /// Export and configure a PWM channel.
    ///
    /// `max_duty` defines the resolution of the duty scale: a duty of
    /// `max_duty` means a 100% pulse width of `period_ns`.
    pub fn new(chip: u32, channel: u32, period_ns: u32, max_duty: u32) -> Result<Self, ActuatorError> {
        let chip_path = PathBuf::from(format!("/sys/class/pwm/pwmchip{}", chip));
        if !chip_path.exists() {
            return Err(ActuatorError::ChipNotFound(chip_path));
        }

        let channel_path = chip_path.join(format!("pwm{}", channel));
        if !channel_path.exists() {
            write_attr(&chip_path.join("export"), channel).map_err(|source| {
                ActuatorError::Export { channel, source }
            })?;
        }

        set_attr(&channel_path, "period", period_ns)?;
        set_attr(&channel_path, "duty_cycle", 0)?;
        set_attr(&channel_path, "enable", 1)?;

        let duty_path = channel_path.join("duty_cycle");
        let duty_file = OpenOptions::new()
            .write(true)
            .open(&duty_path)
            .map_err(|source| ActuatorError::Configure {
                attr: duty_path.display().to_string(),
                source,
            })?;

        log::info!(
            "PWM ready: chip {} channel {} period {}ns max duty {}",
            chip,
            channel,
            period_ns,
            max_duty
        );

        Ok(Self {
            duty_file,
            period_ns,
            max_duty,
            buf: String::with_capacity(16),
        })
    }
}

impl PwmWriter for SysfsPwm {
    fn max_duty(&self) -> u32 {
        self.max_duty
    }

    fn write_duty(&mut self, duty: u32) -> io::Result<()> {
        let duty = duty.min(self.max_duty);
        let duty_ns = self.period_ns as u64 * duty as u64 / self.max_duty as u64;

        self.buf.clear();
        // Writing to a String cannot fail.
        let _ = write!(self.buf, "{}", duty_ns);

        self.duty_file.seek(SeekFrom::Start(0))?;
        self.duty_file.write_all(self.buf.as_bytes())
    }
}

impl Drop for SysfsPwm {
    fn drop(&mut self) {
        // Best-effort: leave the light off.
        let _ = self.write_duty(0);
    }
}

fn write_attr(path: &Path, value: u32) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.write_all(value.to_string().as_bytes())
}

fn set_attr(channel_path: &Path, attr: &str, value: u32) -> Result<(), ActuatorError> {
    let path = channel_path.join(attr);
    write_attr(&path, value).map_err(|source| ActuatorError::Configure {
        attr: path.display().to_string(),
        source,
    })
}
