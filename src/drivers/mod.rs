pub mod channel;
pub mod clock;
pub mod frequency;
pub mod tone;

pub use channel::{FrequencyChannel, FrequencySource};
pub use clock::{prescale, ClockController};
pub use frequency::{parse_frequency, SharedFrequency};
pub use tone::{period_ms, ToneDriver};
