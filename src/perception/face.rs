//! Face narration for face analyzers
//!
//! Turns a batch of detected faces into one short sentence, at most once
//! per speech gap.

use crate::utils::pacing::RateLimiter;
use std::time::Duration;
use tokio::time::Instant;

/// Probability above which a face counts as smiling
const SMILE_THRESHOLD: f32 = 0.5;

/// One face reported by the detector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaceObservation {
    pub smiling_probability: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct FaceNarrator {
    limiter: RateLimiter,
}

impl FaceNarrator {
    pub fn new(speech_gap: Duration) -> Self {
        Self {
            limiter: RateLimiter::new(speech_gap),
        }
    }

    /// Message for `faces`, or `None` when empty or too soon
    pub fn narrate(&mut self, faces: &[FaceObservation], now: Instant) -> Option<String> {
        let first = faces.first()?;
        if !self.limiter.try_acquire(now) {
            return None;
        }
        Some(describe(faces.len(), first))
    }
}

fn describe(count: usize, closest: &FaceObservation) -> String {
    let mood = if closest.smiling_probability.unwrap_or(0.0) > SMILE_THRESHOLD {
        "smiling"
    } else {
        "neutral"
    };

    if count == 1 {
        format!("I see one person. They look {}.", mood)
    } else {
        format!("I see {} people. The closest one looks {}.", count, mood)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(p: f32) -> FaceObservation {
        FaceObservation {
            smiling_probability: Some(p),
        }
    }

    #[test]
    fn test_single_face_message() {
        let mut narrator = FaceNarrator::new(Duration::from_secs(4));
        let msg = narrator.narrate(&[face(0.9)], Instant::now());
        assert_eq!(msg.as_deref(), Some("I see one person. They look smiling."));
    }

    #[test]
    fn test_group_message_uses_first_face() {
        let mut narrator = FaceNarrator::new(Duration::from_secs(4));
        let faces = [face(0.1), face(0.9), FaceObservation::default()];
        let msg = narrator.narrate(&faces, Instant::now());
        assert_eq!(
            msg.as_deref(),
            Some("I see 3 people. The closest one looks neutral.")
        );
    }

    #[test]
    fn test_speech_gap() {
        let mut narrator = FaceNarrator::new(Duration::from_millis(4000));
        let start = Instant::now();
        assert!(narrator.narrate(&[face(0.2)], start).is_some());
        assert!(narrator
            .narrate(&[face(0.2)], start + Duration::from_millis(3999))
            .is_none());
        assert!(narrator
            .narrate(&[face(0.2)], start + Duration::from_millis(4000))
            .is_some());
    }

    #[test]
    fn test_no_faces_keeps_slot() {
        let mut narrator = FaceNarrator::new(Duration::from_secs(4));
        let start = Instant::now();
        assert!(narrator.narrate(&[], start).is_none());
        assert!(narrator.narrate(&[face(0.0)], start).is_some());
    }
}
