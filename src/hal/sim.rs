//! Simulated PWM peripheral
//!
//! Keeps the register values in memory instead of touching hardware. Used by
//! `--simulate` on machines without a PWM block, and by the tests to observe
//! what the loops wrote.

use core::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use embedded_hal::digital::v2::OutputPin;
use embedded_hal::PwmPin;

use super::pwm::{ClockDivider, IntoOutput, Pwm};

/// Number of divisor writes kept in the history
pub const HISTORY_LEN: usize = 256;

/// Register contents of the simulated peripheral
#[derive(Debug, Default)]
pub struct SimState {
    divisor: AtomicU32,
    duty: AtomicU16,
    enabled: AtomicBool,
    output_mode: AtomicBool,
    high: AtomicBool,
    duty_writes: AtomicU32,
    low_writes: AtomicU32,
    divisors: Mutex<VecDeque<u32>>,
}

impl SimState {
    /// Current clock divider
    pub fn divisor(&self) -> u32 {
        self.divisor.load(Ordering::Acquire)
    }

    /// The last [`HISTORY_LEN`] divisors written, oldest first
    pub fn divisor_history(&self) -> Vec<u32> {
        self.divisors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    /// Current duty register
    pub fn duty(&self) -> u16 {
        self.duty.load(Ordering::Acquire)
    }

    pub fn duty_writes(&self) -> u32 {
        self.duty_writes.load(Ordering::Acquire)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// True once the pin has been switched back to a digital output
    pub fn is_output(&self) -> bool {
        self.output_mode.load(Ordering::Acquire)
    }

    pub fn is_high(&self) -> bool {
        self.high.load(Ordering::Acquire)
    }

    /// Number of times the pin was driven low as a digital output
    pub fn low_writes(&self) -> u32 {
        self.low_writes.load(Ordering::Acquire)
    }
}

/// Simulated peripheral, configured with a fixed range
#[derive(Debug)]
pub struct SimPwm {
    state: Arc<SimState>,
    range: u16,
}

impl SimPwm {
    pub fn new(range: u32) -> Self {
        let state = Arc::new(SimState::default());
        state.enabled.store(true, Ordering::Release);
        log::info!("simulated PWM, range {}", range);
        Self {
            state,
            range: range.min(u16::MAX as u32) as u16,
        }
    }

    /// Handle for observing the registers after the peripheral is split
    pub fn state(&self) -> Arc<SimState> {
        Arc::clone(&self.state)
    }
}

impl Pwm for SimPwm {
    type Clock = SimClock;
    type Channel = SimChannel;

    fn split(self) -> (SimClock, SimChannel) {
        (
            SimClock {
                state: Arc::clone(&self.state),
            },
            SimChannel {
                state: self.state,
                range: self.range,
            },
        )
    }
}

#[derive(Debug)]
pub struct SimClock {
    state: Arc<SimState>,
}

impl ClockDivider for SimClock {
    fn set_divisor(&mut self, divisor: u32) {
        log::trace!("sim clock divisor {}", divisor);
        self.state.divisor.store(divisor, Ordering::Release);
        let mut history = self
            .state
            .divisors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if history.len() == HISTORY_LEN {
            history.pop_front();
        }
        history.push_back(divisor);
    }
}

#[derive(Debug)]
pub struct SimChannel {
    state: Arc<SimState>,
    range: u16,
}

impl PwmPin for SimChannel {
    type Duty = u16;

    fn disable(&mut self) {
        self.state.enabled.store(false, Ordering::Release);
    }

    fn enable(&mut self) {
        self.state.enabled.store(true, Ordering::Release);
    }

    fn get_duty(&self) -> u16 {
        self.state.duty()
    }

    fn get_max_duty(&self) -> u16 {
        self.range
    }

    fn set_duty(&mut self, duty: u16) {
        self.state.duty.store(duty, Ordering::Release);
        self.state.duty_writes.fetch_add(1, Ordering::AcqRel);
    }
}

impl IntoOutput for SimChannel {
    type Output = SimPin;

    fn into_output(self) -> SimPin {
        self.state.output_mode.store(true, Ordering::Release);
        SimPin { state: self.state }
    }
}

/// The buzzer pin after it left PWM mode
#[derive(Debug)]
pub struct SimPin {
    state: Arc<SimState>,
}

impl OutputPin for SimPin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.state.high.store(false, Ordering::Release);
        self.state.low_writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.state.high.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_keeps_latest_writes() {
        let pwm = SimPwm::new(1024);
        let state = pwm.state();
        let (mut clock, _channel) = pwm.split();

        for divisor in 0..(HISTORY_LEN as u32 + 44) {
            clock.set_divisor(divisor);
        }

        let history = state.divisor_history();
        assert_eq!(history.len(), HISTORY_LEN);
        assert_eq!(history.first(), Some(&44));
        assert_eq!(history.last(), Some(&(HISTORY_LEN as u32 + 43)));
        assert_eq!(state.divisor(), HISTORY_LEN as u32 + 43);
    }
}
