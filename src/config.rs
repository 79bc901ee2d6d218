//! Configuration constants and runtime settings for the buzzer controller

use core::time::Duration;

/// Reference clock of the PWM peripheral in Hz
pub const BASE_CLOCK_HZ: u32 = 19_200_000;

/// Number of clock ticks in one PWM period
pub const CLOCK_RANGE: u32 = 1024;

/// Fraction of the period the output is held high
pub const DUTY_CYCLE: f64 = 0.5;

/// Name of the shared memory region the frequency is published in
pub const SHM_NAME: &str = "/GUI";

/// Capacity of the shared memory region in bytes
pub const SHM_SIZE: usize = 4096;

/// Interval between two reads of the shared memory region
pub const CHANNEL_POLL: Duration = Duration::from_millis(100);

/// Interval between two clock divider updates
pub const CLOCK_POLL: Duration = Duration::from_millis(100);

/// Shortest sleep of the tone driver, used when 1000 / f rounds down to zero
pub const MIN_TONE_SLEEP: Duration = Duration::from_millis(1);

/// BCM GPIO the buzzer is wired to (wiringPi pin 1)
pub const BUZZER_GPIO: u8 = 18;

/// Environment variable holding the default log filter
pub const LOG_ENV: &str = "BUZZER_LOG";

/// Settings collected from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Shared memory region to read the frequency from
    pub shm_name: String,
    /// BCM GPIO number of the buzzer pin
    pub gpio: u8,
    /// Physical peripheral base address, detected when `None`
    pub peripheral_base: Option<u64>,
    /// Drive the simulated peripheral instead of real registers
    pub simulate: bool,
    /// Number of `-v` flags given
    pub verbosity: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shm_name: SHM_NAME.to_string(),
            gpio: BUZZER_GPIO,
            peripheral_base: None,
            simulate: false,
            verbosity: 0,
        }
    }
}

/// Duty register value for the fixed duty cycle
pub fn duty_ticks() -> u16 {
    (DUTY_CYCLE * CLOCK_RANGE as f64) as u16
}

/// Parses a peripheral base address given as hex, with or without `0x`
pub fn parse_base(text: &str) -> Option<u64> {
    let digits = text.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);
    u64::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_is_half_the_range() {
        assert_eq!(duty_ticks(), 512);
    }

    #[test]
    fn base_address_accepts_prefix() {
        assert_eq!(parse_base("0x3F000000"), Some(0x3F00_0000));
        assert_eq!(parse_base("fe000000"), Some(0xFE00_0000));
        assert_eq!(parse_base("zz"), None);
    }
}
