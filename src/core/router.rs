//! Perception Mode Router
//!
//! Interprets detector callbacks against the armed modes and decides
//! which frame analyzer should hold the camera.

use crate::haptics::HapticPattern;
use crate::perception::AnalyzerKind;
use crate::state::{Direction, Rect, Snapshot, UiState};
use crate::store::StateStore;
use crate::utils::pacing::RateLimiter;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Result of routing one object-detection callback
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectOutcome {
    pub speech: Option<String>,
    pub haptic: Option<HapticPattern>,
}

#[derive(Debug)]
pub struct PerceptionRouter {
    haptic_limiter: RateLimiter,
}

impl PerceptionRouter {
    pub fn new(haptic_min_gap: Duration) -> Self {
        Self {
            haptic_limiter: RateLimiter::new(haptic_min_gap),
        }
    }

    /// Object callback. Ignored unless an object target is armed.
    pub fn on_objects(
        &mut self,
        store: &StateStore,
        labels: &[String],
        bounds: Rect,
        direction: Direction,
        now: Instant,
    ) -> ObjectOutcome {
        let snapshot = store.snapshot();
        if snapshot.ui.is_fall_detected() {
            return ObjectOutcome::default();
        }
        let Some(target) = snapshot.modes.target_object else {
            return ObjectOutcome::default();
        };

        let target = target.to_lowercase();
        let Some(found) = labels.iter().find(|l| l.to_lowercase().contains(&target)) else {
            debug!("Saw {:?}, looking for '{}'", labels, target);
            return ObjectOutcome::default();
        };

        let message = format!("Found {} {}.", found, direction);
        info!("✅ {}", message);
        store.set_ui(UiState::success_at(message.clone(), bounds));

        let haptic = self
            .haptic_limiter
            .try_acquire(now)
            .then(|| HapticPattern::for_direction(direction));

        ObjectOutcome {
            speech: Some(message),
            haptic,
        }
    }

    /// Text callback. One-shot: disarms text mode after the first hit.
    pub fn on_text(&self, store: &StateStore, text: &str) -> Option<String> {
        let snapshot = store.snapshot();
        if snapshot.ui.is_fall_detected() || !snapshot.modes.target_text || text.trim().is_empty() {
            return None;
        }

        let message = format!("Found text: {}", text.trim());
        info!("📖 {}", message);
        store.commit(Some(UiState::success(message.clone())), |m| {
            m.target_text = false;
        });
        Some(message)
    }

    /// Face callback. The provider builds and paces the message.
    pub fn on_face(&self, store: &StateStore, message: &str) -> Option<String> {
        let snapshot = store.snapshot();
        if snapshot.ui.is_fall_detected() || !snapshot.modes.face_mode_on {
            return None;
        }
        Some(message.to_string())
    }
}

/// Which analyzer should hold the camera for this snapshot, if any
pub fn select_analyzer(snapshot: &Snapshot) -> Option<AnalyzerKind> {
    let modes = &snapshot.modes;
    let wanted = snapshot.ui.is_processing()
        || modes.face_mode_on
        || modes.has_reflex_target();

    if !wanted {
        None
    } else if modes.face_mode_on {
        Some(AnalyzerKind::Face)
    } else {
        Some(AnalyzerKind::ObjectText)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ModeFlags;

    fn store() -> StateStore {
        StateStore::new(ModeFlags::new("Describe the scene for me."))
    }

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_objects_ignored_without_target() {
        let store = store();
        let mut router = PerceptionRouter::new(Duration::from_millis(400));
        let outcome = router.on_objects(
            &store,
            &labels(&["bottle"]),
            Rect::new(0, 0, 10, 10),
            Direction::Left,
            Instant::now(),
        );
        assert_eq!(outcome, ObjectOutcome::default());
        assert_eq!(store.ui(), UiState::Idle);
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_object_match_is_case_insensitive_substring() {
        let store = store();
        store.update_modes(|m| m.target_object = Some("bottle".into()));
        let mut router = PerceptionRouter::new(Duration::from_millis(400));
        let rect = Rect::new(10, 20, 110, 220);

        let outcome = router.on_objects(
            &store,
            &labels(&["Person", "Water bottle"]),
            rect,
            Direction::Left,
            Instant::now(),
        );

        assert_eq!(store.ui(), UiState::success_at("Found Water bottle Left.", rect));
        assert_eq!(outcome.speech.as_deref(), Some("Found Water bottle Left."));
        assert_eq!(outcome.haptic, Some(HapticPattern::DoubleTap));
    }

    #[test]
    fn test_haptics_are_spaced() {
        let store = store();
        store.update_modes(|m| m.target_object = Some("door".into()));
        let mut router = PerceptionRouter::new(Duration::from_millis(400));

        let start = Instant::now();
        let mut pulses = Vec::new();
        // a detector reporting every 33ms for three seconds
        for frame in 0..90u64 {
            let now = start + Duration::from_millis(frame * 33);
            let outcome = router.on_objects(
                &store,
                &labels(&["door"]),
                Rect::new(0, 0, 10, 10),
                Direction::Center,
                now,
            );
            assert!(outcome.speech.is_some());
            if outcome.haptic.is_some() {
                pulses.push(now);
            }
        }

        assert!(pulses.len() >= 6);
        for pair in pulses.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(400));
        }
    }

    #[test]
    fn test_text_is_one_shot() {
        let store = store();
        let router = PerceptionRouter::new(Duration::from_millis(400));
        assert_eq!(router.on_text(&store, "EXIT"), None);

        store.update_modes(|m| m.target_text = true);
        assert_eq!(router.on_text(&store, "   "), None);
        assert!(store.modes().target_text);

        let spoken = router.on_text(&store, "EXIT");
        assert_eq!(spoken.as_deref(), Some("Found text: EXIT"));
        assert_eq!(store.ui(), UiState::success("Found text: EXIT"));
        assert!(!store.modes().target_text);

        assert_eq!(router.on_text(&store, "ENTRANCE"), None);
        assert_eq!(store.ui(), UiState::success("Found text: EXIT"));
    }

    #[test]
    fn test_face_requires_face_mode() {
        let store = store();
        let router = PerceptionRouter::new(Duration::from_millis(400));
        assert_eq!(router.on_face(&store, "I see one person. They look neutral."), None);

        store.update_modes(|m| m.face_mode_on = true);
        assert_eq!(
            router.on_face(&store, "I see one person. They look neutral.").as_deref(),
            Some("I see one person. They look neutral.")
        );
        assert_eq!(store.ui(), UiState::Idle);
    }

    #[test]
    fn test_fall_outranks_detections() {
        let store = store();
        store.commit(Some(UiState::FallDetected), |m| {
            m.target_object = Some("door".into());
            m.target_text = true;
            m.face_mode_on = true;
        });
        let mut router = PerceptionRouter::new(Duration::from_millis(400));

        let outcome = router.on_objects(
            &store,
            &labels(&["door"]),
            Rect::new(0, 0, 10, 10),
            Direction::Right,
            Instant::now(),
        );
        assert_eq!(outcome, ObjectOutcome::default());
        assert_eq!(router.on_text(&store, "EXIT"), None);
        assert_eq!(router.on_face(&store, "I see one person."), None);
        assert_eq!(store.ui(), UiState::FallDetected);
        assert!(store.modes().target_text);
    }

    #[test]
    fn test_select_analyzer() {
        let store = store();
        assert_eq!(select_analyzer(&store.snapshot()), None);

        store.set_ui(UiState::processing("Thinking..."));
        assert_eq!(select_analyzer(&store.snapshot()), Some(AnalyzerKind::ObjectText));

        store.update_modes(|m| m.face_mode_on = true);
        assert_eq!(select_analyzer(&store.snapshot()), Some(AnalyzerKind::Face));

        store.commit(Some(UiState::Idle), |m| m.face_mode_on = false);
        assert_eq!(select_analyzer(&store.snapshot()), None);

        store.update_modes(|m| m.target_object = Some("cup".into()));
        assert_eq!(select_analyzer(&store.snapshot()), Some(AnalyzerKind::ObjectText));
    }
}
