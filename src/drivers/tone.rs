//! Tone driver
//!
//! Keeps the duty register at the fixed 50% and paces itself by the period of
//! the current frequency. The frequency is read again on every iteration so a
//! retune is picked up after at most one period.

use core::num::NonZeroU32;
use std::time::Duration;

use embedded_hal::digital::v2::OutputPin;
use embedded_hal::PwmPin;

use super::frequency::SharedFrequency;
use crate::config::{duty_ticks, CLOCK_POLL, MIN_TONE_SLEEP};
use crate::hal::IntoOutput;
use crate::runtime::Task;

/// Length of one tone period in whole milliseconds
pub fn period_ms(hz: NonZeroU32) -> u64 {
    1000 / hz.get() as u64
}

/// Drives the duty register of one PWM channel
///
/// The channel is silenced by [`ToneDriver::finish`], or by `Drop` when the
/// driver is lost, e.g. to a panic on its thread.
pub struct ToneDriver<'a, P: IntoOutput<Duty = u16>> {
    channel: Option<P>,
    frequency: &'a SharedFrequency,
    duty: u16,
}

impl<'a, P> ToneDriver<'a, P>
where
    P: IntoOutput<Duty = u16>,
{
    pub fn new(channel: P, frequency: &'a SharedFrequency) -> Self {
        Self {
            channel: Some(channel),
            frequency,
            duty: duty_ticks(),
        }
    }

    /// Writes the duty register and returns how long to wait
    ///
    /// Nothing is written until the clock controller has published a valid
    /// frequency; until then the driver idles for one controller period.
    pub fn update(&mut self) -> Duration {
        match (self.frequency.load(), self.channel.as_mut()) {
            (Some(hz), Some(channel)) => {
                channel.set_duty(self.duty);
                Duration::from_millis(period_ms(hz)).max(MIN_TONE_SLEEP)
            }
            _ => CLOCK_POLL,
        }
    }

    /// Silences the buzzer and hands back the pin as a low digital output
    ///
    /// Must only be called once the driver loop has exited.
    pub fn finish(mut self) -> Result<P::Output, <P::Output as OutputPin>::Error> {
        let Some(channel) = self.channel.take() else {
            unreachable!("tone channel is only released once");
        };
        let pin = silence(channel)?;
        log::info!("buzzer pin driven low");
        Ok(pin)
    }
}

impl<P: IntoOutput<Duty = u16>> Drop for ToneDriver<'_, P> {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            log::warn!("tone driver dropped without finish, silencing buzzer");
            if silence(channel).is_err() {
                log::error!("cannot drive buzzer pin low");
            }
        }
    }
}

/// Duty 0, channel off, then the pin as a low digital output
fn silence<P>(mut channel: P) -> Result<P::Output, <P::Output as OutputPin>::Error>
where
    P: IntoOutput<Duty = u16>,
{
    channel.set_duty(0);
    channel.disable();
    let mut pin = channel.into_output();
    pin.set_low()?;
    Ok(pin)
}

impl<P> Task for ToneDriver<'_, P>
where
    P: IntoOutput<Duty = u16> + Send,
{
    const NAME: &'static str = "tone";

    fn step(&mut self) -> Duration {
        self.update()
    }

    fn pause(&self, duration: Duration) {
        spin_sleep::sleep(duration);
    }
}
