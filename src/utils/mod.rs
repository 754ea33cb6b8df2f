//! Utility modules

pub mod pacing;

pub use pacing::RateLimiter;
