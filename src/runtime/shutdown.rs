//! Cooperative shutdown shared by every loop

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Running = 0,
    Stopping = 1,
    Stopped = 2,
}

impl State {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => State::Running,
            1 => State::Stopping,
            _ => State::Stopped,
        }
    }
}

/// `Running -> Stopping -> Stopped`, never reset
#[derive(Debug)]
pub struct Shutdown {
    state: AtomicU8,
}

impl Shutdown {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(State::Running as u8),
        }
    }

    #[inline]
    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Checked by the loops at the top of every iteration
    #[inline]
    pub fn is_running(&self) -> bool {
        self.state() == State::Running
    }

    /// Asks every loop to stop; only the first call has an effect
    pub fn request(&self) -> bool {
        let first = self
            .state
            .compare_exchange(
                State::Running as u8,
                State::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if first {
            log::info!("shutdown requested");
        }
        first
    }

    /// Records that every loop thread has been joined
    pub(crate) fn mark_stopped(&self) {
        self.state.store(State::Stopped as u8, Ordering::Release);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_one_shot() {
        let shutdown = Shutdown::new();
        assert!(shutdown.is_running());
        assert!(shutdown.request());
        assert!(!shutdown.request());
        assert_eq!(shutdown.state(), State::Stopping);
    }

    #[test]
    fn stopped_is_terminal() {
        let shutdown = Shutdown::new();
        shutdown.request();
        shutdown.mark_stopped();
        assert!(!shutdown.request());
        assert_eq!(shutdown.state(), State::Stopped);
    }
}
