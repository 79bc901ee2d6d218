//! Reader side of the shared memory frequency channel

use core::convert::Infallible;
use std::time::Duration;

use crate::config::CHANNEL_POLL;
use crate::diagnostics::Diagnostics;
use crate::runtime::Task;

/// Where the raw frequency text comes from
pub trait FrequencySource: Sync {
    /// Copies the text up to the first NUL into `dst` and returns its length
    fn load(&self, dst: &mut [u8]) -> usize;
}

/// Watches the source and reports when the published text changes
#[derive(Debug)]
pub struct FrequencyChannel<'a, S: ?Sized> {
    source: &'a S,
    diagnostics: &'a Diagnostics,
    snapshot: Box<[u8]>,
    snapshot_len: usize,
    scratch: Box<[u8]>,
}

impl<'a, S: FrequencySource + ?Sized> FrequencyChannel<'a, S> {
    pub fn new(source: &'a S, capacity: usize, diagnostics: &'a Diagnostics) -> Self {
        Self {
            source,
            diagnostics,
            snapshot: vec![0; capacity].into_boxed_slice(),
            snapshot_len: 0,
            scratch: vec![0; capacity].into_boxed_slice(),
        }
    }

    /// Returns the new text if it differs from the last one seen
    pub fn poll(&mut self) -> nb::Result<&[u8], Infallible> {
        let len = self.source.load(&mut self.scratch);
        if self.scratch[..len] == self.snapshot[..self.snapshot_len] {
            return Err(nb::Error::WouldBlock);
        }
        core::mem::swap(&mut self.scratch, &mut self.snapshot);
        self.snapshot_len = len;
        Ok(&self.snapshot[..len])
    }

    /// Last text seen
    pub fn current(&self) -> &[u8] {
        &self.snapshot[..self.snapshot_len]
    }
}

impl<S: FrequencySource + ?Sized> Task for FrequencyChannel<'_, S> {
    const NAME: &'static str = "channel";

    fn step(&mut self) -> Duration {
        let changed = match self.poll() {
            Ok(text) => Some(String::from_utf8_lossy(text).into_owned()),
            Err(nb::Error::WouldBlock) => None,
            Err(nb::Error::Other(never)) => match never {},
        };
        if let Some(text) = changed {
            self.diagnostics.frequency_changed(&text);
        }
        CHANNEL_POLL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
            let len = text.len().min(dst.len());
            dst[..len].copy_from_slice(&text[..len]);
            len
        }
    }

    #[test]
    fn reports_each_change_once() {
        let source = Text::new("440");
        let diagnostics = Diagnostics::new();
        let mut channel = FrequencyChannel::new(&source, 64, &diagnostics);

        assert_eq!(channel.poll(), Ok(&b"440"[..]));
        assert_eq!(channel.poll(), Err(nb::Error::WouldBlock));

        source.set("300");
        assert_eq!(channel.poll(), Ok(&b"300"[..]));
        assert_eq!(channel.current(), b"300");
        assert_eq!(channel.poll(), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn empty_region_is_not_a_change() {
        let source = Text::new("");
        let diagnostics = Diagnostics::new();
        let mut channel = FrequencyChannel::new(&source, 64, &diagnostics);
        assert_eq!(channel.poll(), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn step_counts_changes() {
        let source = Text::new("200");
        let diagnostics = Diagnostics::new();
        let mut channel = FrequencyChannel::new(&source, 64, &diagnostics);

        assert_eq!(channel.step(), CHANNEL_POLL);
        channel.step();
        source.set("abc");
        channel.step();
        assert_eq!(diagnostics.change_count(), 2);
    }
}
