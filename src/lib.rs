//! Buzzer controller
//!
//! Plays a buzzer on a Raspberry Pi PWM output at the frequency another
//! process publishes in POSIX shared memory. Three loops run side by side:
//! the channel reader reports changes, the clock controller retunes the PWM
//! clock divider, and the tone driver keeps the 50% duty square wave going.

pub mod application;
pub mod config;
pub mod diagnostics;
pub mod drivers;
pub mod error;
pub mod hal;
pub mod logger;
pub mod os;
pub mod runtime;

pub use application::{Application, Shared};
pub use error::{Error, Result};
