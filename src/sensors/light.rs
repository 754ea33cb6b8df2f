//! Light guidance
//!
//! While enabled, a background loop beeps faster as the ambient light
//! gets brighter so the user can turn toward windows and lamps.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Length of one guidance pip
pub const PIP: Duration = Duration::from_millis(150);

/// How long the loop waits before re-checking a dark room
const DARK_POLL: Duration = Duration::from_millis(500);

/// Something that can play a short tone
pub trait Beeper: Send + Sync + Debug {
    fn beep(&self, duration: Duration);
}

/// Mapping from lux to the gap between beeps
#[derive(Debug, Clone, Copy)]
pub struct LightCurve {
    pub dark_lux: f32,
    pub min_interval: Duration,
    pub max_interval: Duration,
}

impl Default for LightCurve {
    fn default() -> Self {
        Self {
            dark_lux: 10.0,
            min_interval: Duration::from_millis(50),
            max_interval: Duration::from_millis(1000),
        }
    }
}

impl LightCurve {
    /// Gap after a beep, or `None` when it is too dark to beep at all
    pub fn beep_interval(&self, lux: f32) -> Option<Duration> {
        if !lux.is_finite() || lux < self.dark_lux {
            return None;
        }
        let millis = (2000.0 / (lux / 10.0 + 1.0)) as u64;
        let min = self.min_interval.as_millis() as u64;
        let max = self.max_interval.as_millis() as u64;
        Some(Duration::from_millis(millis.clamp(min, max)))
    }
}

#[derive(Debug)]
pub struct LightGuide {
    curve: LightCurve,
    beeper: Arc<dyn Beeper>,
    lux: watch::Sender<f32>,
    task: Option<JoinHandle<()>>,
}

impl LightGuide {
    pub fn new(curve: LightCurve, beeper: Arc<dyn Beeper>) -> Self {
        let (lux, _) = watch::channel(0.0);
        Self {
            curve,
            beeper,
            lux,
            task: None,
        }
    }

    pub fn update_lux(&self, lux: f32) {
        self.lux.send_replace(lux);
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn start(&mut self) {
        self.stop();
        info!("💡 Light guidance started");

        let curve = self.curve;
        let beeper = Arc::clone(&self.beeper);
        let lux = self.lux.subscribe();
        self.task = Some(tokio::spawn(async move {
            loop {
                let current = *lux.borrow();
                match curve.beep_interval(current) {
                    Some(gap) => {
                        beeper.beep(PIP);
                        tokio::time::sleep(gap).await;
                    }
                    None => tokio::time::sleep(DARK_POLL).await,
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("💡 Light guidance stopped");
        }
    }
}

impl Drop for LightGuide {
    fn drop(&mut self) {
        self.stop();
    }
}
