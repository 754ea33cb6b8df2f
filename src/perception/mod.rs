//! Perception Providers
//!
//! Frame analyzers are external detectors that push results into the
//! session while they hold the camera. Only one analyzer may hold the
//! frame-analysis slot at a time; switching always detaches the previous
//! one before attaching the next.

pub mod face;

use crate::session::SessionEvent;
use crate::state::{Direction, Rect};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

pub use face::{FaceNarrator, FaceObservation};

/// The two analyzer pipelines that can own the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyzerKind {
    /// Face count and mood
    Face,
    /// Combined object detection and text recognition
    ObjectText,
}

/// Non-blocking handle analyzers use to report results
#[derive(Debug, Clone)]
pub struct PerceptionSink {
    tx: mpsc::Sender<SessionEvent>,
}

impl PerceptionSink {
    pub fn new(tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    pub fn objects(&self, labels: Vec<String>, bounds: Rect, direction: Direction) -> bool {
        self.push(SessionEvent::Objects {
            labels,
            bounds,
            direction,
        })
    }

    pub fn text(&self, text: impl Into<String>) -> bool {
        self.push(SessionEvent::Text(text.into()))
    }

    pub fn face(&self, message: impl Into<String>) -> bool {
        self.push(SessionEvent::Face(message.into()))
    }

    /// Results are dropped rather than queued when the session is busy
    fn push(&self, event: SessionEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Session busy, dropping frame result");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// A detector pipeline that can be attached to the camera feed
#[async_trait]
pub trait FrameAnalyzer: Send + Sync + Debug {
    /// Start analyzing frames and reporting through `sink`
    async fn attach(&self, sink: PerceptionSink) -> Result<()>;

    /// Stop analyzing frames. Must not report after returning.
    async fn detach(&self) -> Result<()>;
}

/// Owner of the single frame-analysis slot
#[derive(Debug)]
pub struct AnalyzerSlot {
    face: Option<Arc<dyn FrameAnalyzer>>,
    object_text: Option<Arc<dyn FrameAnalyzer>>,
    active: Option<AnalyzerKind>,
    camera_allowed: bool,
    sink: PerceptionSink,
}

impl AnalyzerSlot {
    pub fn new(
        face: Option<Arc<dyn FrameAnalyzer>>,
        object_text: Option<Arc<dyn FrameAnalyzer>>,
        camera_allowed: bool,
        sink: PerceptionSink,
    ) -> Self {
        Self {
            face,
            object_text,
            active: None,
            camera_allowed,
            sink,
        }
    }

    pub fn active(&self) -> Option<AnalyzerKind> {
        self.active
    }

    fn provider(&self, kind: AnalyzerKind) -> Option<&Arc<dyn FrameAnalyzer>> {
        match kind {
            AnalyzerKind::Face => self.face.as_ref(),
            AnalyzerKind::ObjectText => self.object_text.as_ref(),
        }
    }

    /// Make `wanted` the only attached analyzer (or none)
    pub async fn switch_to(&mut self, wanted: Option<AnalyzerKind>) {
        let wanted = if self.camera_allowed { wanted } else { None };
        if wanted == self.active {
            return;
        }

        if let Some(current) = self.active.take() {
            if let Some(provider) = self.provider(current) {
                match provider.detach().await {
                    Ok(()) => info!("📷 Detached {:?} analyzer", current),
                    Err(e) => warn!("⚠️ Failed to detach {:?} analyzer: {}", current, e),
                }
            }
        }

        let Some(next) = wanted else {
            return;
        };
        let Some(provider) = self.provider(next).cloned() else {
            debug!("No {:?} analyzer installed", next);
            return;
        };
        match provider.attach(self.sink.clone()).await {
            Ok(()) => {
                info!("📷 Attached {:?} analyzer", next);
                self.active = Some(next);
            }
            Err(e) => warn!("⚠️ Failed to attach {:?} analyzer: {}", next, e),
        }
    }
}
