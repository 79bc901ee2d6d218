//! Application layer
//!
//! Wires the frequency channel, the clock controller and the tone driver
//! together and runs each on its own thread until shutdown is requested.

use core::fmt::Debug;
use core::num::NonZeroU32;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use embedded_hal::digital::v2::OutputPin;

use crate::diagnostics::Diagnostics;
use crate::drivers::{ClockController, FrequencyChannel, FrequencySource, SharedFrequency, ToneDriver};
use crate::error::{Error, Result};
use crate::hal::{IntoOutput, Pwm};
use crate::runtime::{task, Shutdown};

/// The buzzer pin handed back once the loops have stopped
pub type ReleasedPin<P> = <<P as Pwm>::Channel as IntoOutput>::Output;

type PinError<P> = <ReleasedPin<P> as OutputPin>::Error;

/// State read and written by the loops
#[derive(Debug, Default)]
pub struct Shared {
    pub frequency: SharedFrequency,
    pub shutdown: Shutdown,
    pub diagnostics: Diagnostics,
}

/// Main application state
pub struct Application<'a, S: ?Sized> {
    source: &'a S,
    capacity: usize,
    shared: Shared,
}

impl<'a, S: FrequencySource + ?Sized> Application<'a, S> {
    /// Create new application reading at most `capacity` bytes of `source`
    pub fn new(source: &'a S, capacity: usize) -> Self {
        Self {
            source,
            capacity,
            shared: Shared::default(),
        }
    }

    pub fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Last valid frequency seen by the clock controller
    pub fn frequency(&self) -> Option<NonZeroU32> {
        self.shared.frequency.load()
    }

    /// Runs the loops until `until` returns, then stops them
    ///
    /// `until` runs on the calling thread and stands for the user's quit
    /// command. Once it returns, shutdown is requested, all three threads are
    /// joined, and only then is the buzzer silenced and its pin returned.
    /// A panic in `until` goes through the same shutdown before it is
    /// resumed.
    pub fn run<P, F>(&self, pwm: P, until: F) -> Result<ReleasedPin<P>>
    where
        P: Pwm,
        PinError<P>: Debug,
        F: FnOnce(&Shared),
    {
        let shared = &self.shared;
        let (clock, channel) = pwm.split();

        thread::scope(|s| -> Result<ReleasedPin<P>> {
            let tone = task::spawn(
                s,
                ToneDriver::new(channel, &shared.frequency),
                &shared.shutdown,
            )?;

            let controller = ClockController::new(
                self.source,
                clock,
                &shared.frequency,
                &shared.diagnostics,
                self.capacity,
            );
            let reader = FrequencyChannel::new(self.source, self.capacity, &shared.diagnostics);
            let spawned = task::spawn(s, controller, &shared.shutdown).and_then(|clock| {
                let reader = task::spawn(s, reader, &shared.shutdown)?;
                Ok((clock, reader))
            });
            let (clock, reader) = match spawned {
                Ok(handles) => handles,
                Err(e) => {
                    shared.shutdown.request();
                    if let Err(finish_err) = finish(tone.join()) {
                        log::error!("{}", finish_err);
                    }
                    return Err(e);
                }
            };

            let quit = panic::catch_unwind(AssertUnwindSafe(|| until(shared)));
            shared.shutdown.request();

            let reader = reader.join();
            let clock = clock.join();
            let tone = tone.join();
            shared.shutdown.mark_stopped();

            let pin = finish(tone);
            if let Err(payload) = quit {
                panic::resume_unwind(payload);
            }
            reader?;
            clock?;
            pin
        })
    }
}

fn finish<P>(tone: Result<ToneDriver<'_, P>>) -> Result<P::Output>
where
    P: IntoOutput<Duty = u16>,
    <P::Output as OutputPin>::Error: Debug,
{
    tone?
        .finish()
        .map_err(|e| Error::Finalize(format!("{:?}", e)))
}
