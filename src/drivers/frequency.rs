//! The frequency value shared between the loops

use core::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};

/// Lock-free slot holding the last valid frequency in Hz
///
/// Written by the clock controller only, read by the tone driver. Zero means
/// no valid frequency has been published yet.
#[derive(Debug, Default)]
pub struct SharedFrequency(AtomicU32);

impl SharedFrequency {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    #[inline]
    pub fn load(&self) -> Option<NonZeroU32> {
        NonZeroU32::new(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, hz: NonZeroU32) {
        self.0.store(hz.get(), Ordering::Relaxed);
    }
}

/// Parses the decimal frequency published by the producer
///
/// Reads like `sscanf("%d")`: the text ends at the first NUL, leading
/// whitespace is skipped, an optional sign is accepted and the longest run of
/// digits is taken. Anything that is not a positive number that fits in a
/// `u32` is rejected.
pub fn parse_frequency(raw: &[u8]) -> Option<NonZeroU32> {
    let text = raw.split(|&b| b == 0).next().unwrap_or(&[]);
    let start = text.iter().position(|b| !b.is_ascii_whitespace())?;
    let text = &text[start..];

    let (negative, digits) = match text.first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let len = digits.iter().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }

    let mut value: u32 = 0;
    for &d in &digits[..len] {
        value = value.checked_mul(10)?.checked_add((d - b'0') as u32)?;
    }
    if negative {
        return None;
    }
    NonZeroU32::new(value)
}
