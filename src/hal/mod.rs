pub mod pwm;
pub mod sim;

#[cfg(feature = "bcm2835")]
pub mod bcm2835;

// Re-export commonly used types
pub use pwm::{ClockDivider, IntoOutput, Pwm, PwmChannel, PwmMode};
pub use sim::{SimPwm, SimState};

#[cfg(feature = "bcm2835")]
pub use bcm2835::Bcm2835;
