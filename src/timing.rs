//! Silence detection
//!
//! Modbus RTU has no length or delimiter fields: a frame ends when the line
//! has been quiet long enough. All thresholds are multiples of the
//! half-character time, computed once from the baud rate.

use crate::constants::{
    FIXED_HALF_CHAR_TIME_US, FIXED_TIMING_BAUD_THRESHOLD, FULL_SILENCE_MULTIPLIER,
    HALF_CHAR_TIME_NUMERATOR, HALF_SILENCE_MULTIPLIER,
};

/// Half of one character time at `baud_rate`, in microseconds
///
/// Above 19200 baud the Modbus serial line specification fixes the timers,
/// giving a constant 250 µs.
pub fn half_char_time_us(baud_rate: u32) -> u64 {
    if baud_rate > FIXED_TIMING_BAUD_THRESHOLD {
        FIXED_HALF_CHAR_TIME_US
    } else {
        HALF_CHAR_TIME_NUMERATOR / u64::from(baud_rate.max(1))
    }
}

/// Last line activity and the silence threshold derived from the baud rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    half_char_us: u64,
    last_communication: u64,
}

impl Timing {
    /// Start timing at `now`
    ///
    /// The last activity is placed 3.5T in the future so that bytes of a
    /// frame already in flight when the engine starts are not mistaken for
    /// the start of a new one.
    pub fn new(baud_rate: u32, now: u64) -> Self {
        let half_char_us = half_char_time_us(baud_rate);
        Self {
            half_char_us,
            last_communication: now + half_char_us * FULL_SILENCE_MULTIPLIER,
        }
    }

    #[inline]
    pub fn half_char_us(&self) -> u64 {
        self.half_char_us
    }

    /// The 1.5T inter-frame silence
    #[inline]
    pub fn silence_threshold_us(&self) -> u64 {
        self.half_char_us * HALF_SILENCE_MULTIPLIER
    }

    /// Timestamp of the last byte received or written
    #[inline]
    pub fn last_communication(&self) -> u64 {
        self.last_communication
    }

    /// Record line activity at `now`
    #[inline]
    pub fn touch(&mut self, now: u64) {
        self.last_communication = now;
    }

    /// Microseconds of silence at `now`, zero while the guard is still in the future
    #[inline]
    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_communication)
    }

    /// True once more than 1.5T have passed since the last activity
    #[inline]
    pub fn silence_elapsed(&self, now: u64) -> bool {
        self.elapsed(now) > self.silence_threshold_us()
    }
}
