//! Error type shared by the whole crate

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum Error {
    /// The shared memory region could not be opened
    ShmOpen { name: String, source: io::Error },
    /// The region or the peripheral registers could not be mapped
    Map(io::Error),
    /// `/dev/mem` could not be opened
    DevMem(io::Error),
    /// The peripheral base address could not be read from the device tree
    PeripheralBase,
    /// The GPIO cannot be routed to the PWM peripheral
    UnsupportedPin(u8),
    /// A loop thread could not be started
    Spawn(io::Error),
    /// A loop thread panicked before it could be joined
    TaskPanicked(&'static str),
    /// The buzzer pin could not be driven low
    Finalize(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ShmOpen { name, source } => {
                write!(f, "cannot open shared memory {}: {}", name, source)
            }
            Error::Map(e) => write!(f, "mmap failed: {}", e),
            Error::DevMem(e) => write!(f, "cannot open /dev/mem: {}", e),
            Error::PeripheralBase => write!(f, "peripheral base address unknown"),
            Error::UnsupportedPin(gpio) => write!(f, "GPIO {} has no PWM function", gpio),
            Error::Spawn(e) => write!(f, "cannot spawn thread: {}", e),
            Error::TaskPanicked(name) => write!(f, "{} thread panicked", name),
            Error::Finalize(e) => write!(f, "cannot silence buzzer: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ShmOpen { source, .. } => Some(source),
            Error::Map(e) | Error::DevMem(e) | Error::Spawn(e) => Some(e),
            _ => None,
        }
    }
}
