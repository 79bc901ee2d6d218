//! Clock prescale controller
//!
//! Turns the published frequency into the PWM clock divider. The divider sets
//! the pitch: one PWM period is `CLOCK_RANGE` ticks of the divided clock.

use core::num::NonZeroU32;
use std::time::Duration;

use super::channel::FrequencySource;
use super::frequency::{parse_frequency, SharedFrequency};
use crate::config::{BASE_CLOCK_HZ, CLOCK_POLL, CLOCK_RANGE};
use crate::diagnostics::Diagnostics;
use crate::hal::ClockDivider;
use crate::runtime::Task;

/// Clock divider that makes one PWM period last `1 / hz` seconds
pub fn prescale(hz: NonZeroU32) -> u32 {
    (BASE_CLOCK_HZ as u64 / (hz.get() as u64 * CLOCK_RANGE as u64)) as u32
}

pub struct ClockController<'a, S: ?Sized, C> {
    source: &'a S,
    clock: C,
    frequency: &'a SharedFrequency,
    diagnostics: &'a Diagnostics,
    raw: Box<[u8]>,
    applied: Option<u32>,
}

impl<'a, S, C> ClockController<'a, S, C>
where
    S: FrequencySource + ?Sized,
    C: ClockDivider,
{
    pub fn new(
        source: &'a S,
        clock: C,
        frequency: &'a SharedFrequency,
        diagnostics: &'a Diagnostics,
        capacity: usize,
    ) -> Self {
        Self {
            source,
            clock,
            frequency,
            diagnostics,
            raw: vec![0; capacity].into_boxed_slice(),
            applied: None,
        }
    }

    /// Re-reads the published frequency and retunes the clock if needed
    ///
    /// Returns the divider in force afterwards, `None` until a valid
    /// frequency has been seen.
    pub fn update(&mut self) -> Option<u32> {
        let len = self.source.load(&mut self.raw);
        match parse_frequency(&self.raw[..len]) {
            Some(hz) => self.frequency.store(hz),
            None => self.diagnostics.sample_rejected(&self.raw[..len]),
        }

        let hz = self.frequency.load()?;
        let divisor = prescale(hz);
        if self.applied != Some(divisor) {
            self.clock.set_divisor(divisor);
            self.applied = Some(divisor);
            self.diagnostics.divisor_applied(hz, divisor);
        }
        Some(divisor)
    }

    /// Divider last written to the hardware
    pub fn applied(&self) -> Option<u32> {
        self.applied
    }
}

impl<S, C> Task for ClockController<'_, S, C>
where
    S: FrequencySource + ?Sized,
    C: ClockDivider + Send,
{
    const NAME: &'static str = "clock";

    fn step(&mut self) -> Duration {
        self.update();
        CLOCK_POLL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{Pwm, SimPwm};
    use std::sync::Mutex;

    struct Text(Mutex<Vec<u8>>);

    impl Text {
        fn new(text: &str) -> Self {
            Text(Mutex::new(text.as_bytes().to_vec()))
        }

        fn set(&self, text: &str) {
            *self.0.lock().unwrap() = text.as_bytes().to_vec();
        }
    }

    impl FrequencySource for Text {
        fn load(&self, dst: &mut [u8]) -> usize {
            let text = self.0.lock().unwrap();
            dst[..text.len()].copy_from_slice(&text);
            text.len()
        }
    }

    fn hz(value: u32) -> NonZeroU32 {
        NonZeroU32::new(value).unwrap()
    }

    #[test]
    fn prescale_uses_floor_division() {
        assert_eq!(prescale(hz(440)), 42);
        assert_eq!(prescale(hz(200)), 93);
        assert_eq!(prescale(hz(300)), 62);
        assert_eq!(prescale(hz(1)), 18_750);
        assert_eq!(prescale(hz(u32::MAX)), 0);
    }

    #[test]
    fn retunes_on_change() {
        let source = Text::new("200");
        let frequency = SharedFrequency::new();
        let diagnostics = Diagnostics::new();
        let pwm = SimPwm::new(CLOCK_RANGE);
        let state = pwm.state();
        let (clock, _channel) = pwm.split();
        let mut controller = ClockController::new(&source, clock, &frequency, &diagnostics, 64);

        assert_eq!(controller.update(), Some(93));
        source.set("300");
        assert_eq!(controller.update(), Some(62));
        source.set("200");
        assert_eq!(controller.update(), Some(93));

        assert_eq!(state.divisor_history(), vec![93, 62, 93]);
        assert_eq!(frequency.load(), Some(hz(200)));
    }

    #[test]
    fn same_frequency_is_written_once() {
        let source = Text::new("440");
        let frequency = SharedFrequency::new();
        let diagnostics = Diagnostics::new();
        let pwm = SimPwm::new(CLOCK_RANGE);
        let state = pwm.state();
        let (clock, _channel) = pwm.split();
        let mut controller = ClockController::new(&source, clock, &frequency, &diagnostics, 64);

        controller.update();
        controller.update();
        controller.update();
        assert_eq!(state.divisor_history(), vec![42]);
        assert_eq!(diagnostics.divisor_writes(), 1);
    }

    #[test]
    fn garbage_keeps_last_frequency() {
        let source = Text::new("440");
        let frequency = SharedFrequency::new();
        let diagnostics = Diagnostics::new();
        let pwm = SimPwm::new(CLOCK_RANGE);
        let state = pwm.state();
        let (clock, _channel) = pwm.split();
        let mut controller = ClockController::new(&source, clock, &frequency, &diagnostics, 64);

        controller.update();
        for bad in ["abc", "0", "-440", ""] {
            source.set(bad);
            assert_eq!(controller.update(), Some(42));
            assert_eq!(frequency.load(), Some(hz(440)));
        }
        assert_eq!(state.divisor_history(), vec![42]);
        assert_eq!(diagnostics.rejected_count(), 4);
    }

    #[test]
    fn nothing_applied_before_first_valid_value() {
        let source = Text::new("abc");
        let frequency = SharedFrequency::new();
        let diagnostics = Diagnostics::new();
        let pwm = SimPwm::new(CLOCK_RANGE);
        let state = pwm.state();
        let (clock, _channel) = pwm.split();
        let mut controller = ClockController::new(&source, clock, &frequency, &diagnostics, 64);

        assert_eq!(controller.update(), None);
        assert_eq!(controller.applied(), None);
        assert!(state.divisor_history().is_empty());
    }
}
