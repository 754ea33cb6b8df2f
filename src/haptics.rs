//! Haptic feedback
//!
//! Direction-coded vibration patterns for object matches. Pacing lives in
//! the router; devices only play what they are given.

use crate::state::Direction;
use std::fmt::Debug;

/// Amplitude used by the platform when none is given
pub const DEFAULT_AMPLITUDE: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticPattern {
    /// Two short buzzes: object on the left
    DoubleTap,
    /// One long buzz: object on the right
    LongBuzz,
    /// One short, strong buzz: object straight ahead
    ShortTick,
}

impl HapticPattern {
    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::Left => HapticPattern::DoubleTap,
            Direction::Right => HapticPattern::LongBuzz,
            Direction::Center => HapticPattern::ShortTick,
        }
    }

    /// Alternating off/on timings in milliseconds, starting with a delay
    pub fn timings_ms(&self) -> &'static [u64] {
        match self {
            HapticPattern::DoubleTap => &[0, 50, 50, 50],
            HapticPattern::LongBuzz => &[0, 300],
            HapticPattern::ShortTick => &[0, 50],
        }
    }

    pub fn amplitude(&self) -> u8 {
        match self {
            HapticPattern::ShortTick => 255,
            _ => DEFAULT_AMPLITUDE,
        }
    }
}

/// A vibration motor
pub trait Haptics: Send + Sync + Debug {
    fn pulse(&self, pattern: HapticPattern);
}
