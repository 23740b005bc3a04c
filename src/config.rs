/// Timing knobs for the driver.
///
/// The defaults follow the AT45DB081 datasheet: page erase and "buffer to page
/// with erase" finish well within 100 ms, a full chip erase can take several
/// seconds, the reset pulse is held for at least 1 ms, and the device needs
/// 35 µs after resume from deep power-down before it takes commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Config {
    /// Sleep between two status polls.
    pub poll_interval_us: u32,
    /// Accumulated sleep after which a busy device is declared unresponsive.
    pub ready_timeout_us: u32,
    /// Same as `ready_timeout_us`, used while a chip erase is running.
    pub chip_erase_timeout_us: u32,
    /// How long the reset line is held low by `init`.
    pub reset_pulse_ms: u32,
    /// Wait after the resume command (tRDPD).
    pub resume_delay_us: u32,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            poll_interval_us: 50,
            ready_timeout_us: 200_000,
            chip_erase_timeout_us: 20_000_000,
            reset_pulse_ms: 1,
            resume_delay_us: 35,
        }
    }

    pub const fn with_poll_interval_us(mut self, us: u32) -> Self {
        self.poll_interval_us = us;
        self
    }

    pub const fn with_ready_timeout_us(mut self, us: u32) -> Self {
        self.ready_timeout_us = us;
        self
    }

    pub const fn with_chip_erase_timeout_us(mut self, us: u32) -> Self {
        self.chip_erase_timeout_us = us;
        self
    }

    pub const fn with_reset_pulse_ms(mut self, ms: u32) -> Self {
        self.reset_pulse_ms = ms;
        self
    }

    pub const fn with_resume_delay_us(mut self, us: u32) -> Self {
        self.resume_delay_us = us;
        self
    }

    /// Number of sleeps allowed before `timeout_us` is exhausted.
    pub(crate) fn poll_budget(&self, timeout_us: u32) -> u32 {
        timeout_us / self.poll_interval_us.max(1)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
