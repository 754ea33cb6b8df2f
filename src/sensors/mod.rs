//! Sensor thresholding
//!
//! Raw accelerometer and light readings arrive from the platform; these
//! modules decide when they matter.

pub mod fall;
pub mod light;

pub use fall::{g_force, FallDetector};
pub use light::{Beeper, LightCurve, LightGuide};
