//! PWM peripheral abstraction
//!
//! The buzzer needs two things from the peripheral: a clock divider that sets
//! the tone pitch, and a duty register that keeps the square wave going. The
//! two halves are written from different threads, so a peripheral is split
//! into independently owned handles before any loop starts.

use embedded_hal::digital::v2::OutputPin;
use embedded_hal::PwmPin;

/// PWM generation mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PwmMode {
    /// Output high for `duty` ticks, then low for the rest of the range
    MarkSpace,
    /// Pulses spread evenly over the range
    Balanced,
}

/// PWM output of the peripheral
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PwmChannel {
    Pwm0,
    Pwm1,
}

/// Writer of the PWM clock divider register
pub trait ClockDivider {
    /// Divides the base clock by `divisor`
    fn set_divisor(&mut self, divisor: u32);
}

/// A PWM channel that can be switched back to a plain digital output
pub trait IntoOutput: PwmPin {
    type Output: OutputPin;

    fn into_output(self) -> Self::Output;
}

/// A PWM peripheral configured for one channel
pub trait Pwm {
    type Clock: ClockDivider + Send + 'static;
    type Channel: IntoOutput<Duty = u16> + Send + 'static;

    /// Hands out the clock and the channel as separately owned handles
    fn split(self) -> (Self::Clock, Self::Channel);
}
