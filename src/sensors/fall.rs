//! Fall detection from accelerometer readings

use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Magnitude of an acceleration vector in m/s²
pub fn g_force(x: f32, y: f32, z: f32) -> f32 {
    (x * x + y * y + z * z).sqrt()
}

#[derive(Debug, Clone)]
pub struct FallDetector {
    impact_threshold: f32,
    debounce: Duration,
    last_fall: Option<Instant>,
}

impl FallDetector {
    pub fn new(impact_threshold: f32, debounce: Duration) -> Self {
        Self {
            impact_threshold,
            debounce,
            last_fall: None,
        }
    }

    /// Feed one reading; true when it counts as a new fall
    pub fn on_reading(&mut self, [x, y, z]: [f32; 3], now: Instant) -> bool {
        let g = g_force(x, y, z);
        if g <= self.impact_threshold {
            return false;
        }

        if let Some(last) = self.last_fall {
            if now.saturating_duration_since(last) <= self.debounce {
                return false;
            }
        }

        info!("💥 Impact of {:.1} m/s² detected", g);
        self.last_fall = Some(now);
        true
    }
}
