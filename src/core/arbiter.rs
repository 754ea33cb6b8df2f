//! Command Arbiter
//!
//! Turns one utterance into one command and applies it to the session
//! state. Rules are checked in a fixed order and the first match wins:
//!
//! 1. "who" / "people" / "person"      → face mode on
//! 2. "stop" while face mode is on     → face mode off
//! 3. "light" + "mode"/"sensor"        → light guidance on/off
//! 4. (marker) `Processing("Thinking...")`
//! 5. "stop"/"ok"/"cancel" during a fall → cancel the SOS
//! 6. wake word or "describe" prefix   → cloud description
//! 7. "find" prefix                    → reflex object search
//! 8. "read" prefix                    → reflex text search
//! 9. anything else                    → error hint
//!
//! Rules 1-3 leave the `UiState` untouched.

use super::text_normalizer::strip_word_prefix;
use crate::state::{UiState, CAPTURE_PHOTO};
use crate::store::StateStore;
use tracing::{debug, info};

pub const THINKING: &str = "Thinking...";
pub const LOOKING_FOR_TEXT: &str = "Looking for text...";
pub const NOT_UNDERSTOOD: &str =
    "Sorry, I didn't understand. Try 'find [object]', 'read text', or 'Gemini, describe'.";

const FACE_TRIGGERS: &[&str] = &["who", "people", "person"];
const CANCEL_WORDS: &[&str] = &["stop", "ok", "cancel"];

/// A parsed voice command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FaceModeOn,
    FaceModeOff,
    /// `None` when the phrase named light mode without on/off
    LightMode(Option<bool>),
    CancelEmergency,
    Describe { prompt: String },
    Find { target: String },
    ReadText,
    NotRecognized,
}

impl Command {
    /// Mode toggles return before the processing marker is written
    pub fn is_mode_toggle(&self) -> bool {
        matches!(
            self,
            Command::FaceModeOn | Command::FaceModeOff | Command::LightMode(_)
        )
    }
}

/// What the arbiter decided and what should be spoken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbiterOutcome {
    pub command: Command,
    pub speech: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommandArbiter {
    wake_words: Vec<String>,
    default_prompt: String,
}

impl CommandArbiter {
    pub fn new(wake_words: Vec<String>, default_prompt: impl Into<String>) -> Self {
        Self {
            wake_words,
            default_prompt: default_prompt.into(),
        }
    }

    /// Match an utterance against the rules.
    ///
    /// `face_mode_on` and `in_fall` describe the state before the
    /// utterance arrived.
    pub fn parse(&self, utterance: &str, face_mode_on: bool, in_fall: bool) -> Command {
        let text = utterance.trim();
        let lower = text.to_lowercase();

        if FACE_TRIGGERS.iter().any(|w| lower.contains(w)) {
            return Command::FaceModeOn;
        }

        if lower.contains("stop") && face_mode_on {
            return Command::FaceModeOff;
        }

        if lower.contains("light") && (lower.contains("mode") || lower.contains("sensor")) {
            return Command::LightMode(Self::light_switch(&lower));
        }

        if in_fall && CANCEL_WORDS.iter().any(|w| lower.contains(w)) {
            return Command::CancelEmergency;
        }

        if let Some(rest) = self.cloud_question(text) {
            let prompt = if rest.trim().is_empty() {
                self.default_prompt.clone()
            } else {
                rest.trim().to_string()
            };
            return Command::Describe { prompt };
        }

        if let Some(target) = strip_word_prefix(text, "find") {
            let target = target.trim();
            if !target.is_empty() {
                return Command::Find {
                    target: target.to_string(),
                };
            }
            debug!("'find' without a target");
            return Command::NotRecognized;
        }

        if strip_word_prefix(text, "read").is_some() {
            return Command::ReadText;
        }

        Command::NotRecognized
    }

    /// Interpret an utterance and apply its effects to `store`
    pub fn interpret(&self, store: &StateStore, utterance: &str) -> ArbiterOutcome {
        let before = store.snapshot();
        let command = self.parse(
            utterance,
            before.modes.face_mode_on,
            before.ui.is_fall_detected(),
        );
        info!("🎯 '{}' -> {:?}", utterance, command);

        if command.is_mode_toggle() {
            let speech = self.apply_toggle(store, &command);
            return ArbiterOutcome { command, speech };
        }

        store.set_ui(UiState::processing(THINKING));

        let speech = match &command {
            Command::CancelEmergency => {
                store.set_ui(UiState::Idle);
                Some("SOS Cancelled.".to_string())
            }
            Command::Describe { prompt } => {
                let prompt = prompt.clone();
                store.commit(Some(UiState::success(CAPTURE_PHOTO)), move |m| {
                    m.clear_reflex_targets();
                    m.last_cloud_prompt = prompt;
                });
                None
            }
            Command::Find { target } => {
                let message = format!("Looking for {}...", target);
                let target = target.clone();
                store.commit(Some(UiState::processing(message.clone())), move |m| {
                    m.target_object = Some(target);
                    m.target_text = false;
                });
                Some(message)
            }
            Command::ReadText => {
                store.commit(Some(UiState::processing(LOOKING_FOR_TEXT)), |m| {
                    m.target_object = None;
                    m.target_text = true;
                });
                Some(LOOKING_FOR_TEXT.to_string())
            }
            _ => {
                store.set_ui(UiState::error(NOT_UNDERSTOOD));
                Some(NOT_UNDERSTOOD.to_string())
            }
        };

        ArbiterOutcome { command, speech }
    }

    fn apply_toggle(&self, store: &StateStore, command: &Command) -> Option<String> {
        match command {
            Command::FaceModeOn => {
                store.update_modes(|m| m.face_mode_on = true);
                Some("Looking for people...".to_string())
            }
            Command::FaceModeOff => {
                store.update_modes(|m| m.face_mode_on = false);
                Some("Stopped looking.".to_string())
            }
            Command::LightMode(Some(on)) => {
                let on = *on;
                store.update_modes(|m| m.light_mode_on = on);
                Some(if on {
                    "Light guidance on.".to_string()
                } else {
                    "Light guidance off.".to_string()
                })
            }
            _ => None,
        }
    }

    /// Remainder after a wake word or "describe", if the utterance starts with one
    fn cloud_question<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.wake_words
            .iter()
            .map(String::as_str)
            .chain(std::iter::once("describe"))
            .find_map(|prefix| strip_word_prefix(text, prefix))
    }

    fn light_switch(lower: &str) -> Option<bool> {
        let words: Vec<&str> = lower.split_whitespace().collect();
        if words.iter().any(|w| *w == "on" || *w == "start") {
            Some(true)
        } else if words.iter().any(|w| *w == "off" || *w == "stop") {
            Some(false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ModeFlags, Rect};

    const DEFAULT_PROMPT: &str = "Describe the scene for me.";

    fn arbiter() -> CommandArbiter {
        CommandArbiter::new(
            vec!["gemini".to_string(), "sightguide".to_string()],
            DEFAULT_PROMPT,
        )
    }

    fn store() -> StateStore {
        StateStore::new(ModeFlags::new(DEFAULT_PROMPT))
    }

    #[test]
    fn test_rule1_face_mode_beats_everything() {
        // also contains "find", "stop" and a wake word
        let cmd = arbiter().parse("gemini find the person and stop", true, true);
        assert_eq!(cmd, Command::FaceModeOn);
    }

    #[test]
    fn test_rule2_stop_only_with_face_mode() {
        let a = arbiter();
        assert_eq!(a.parse("stop light mode", true, false), Command::FaceModeOff);
        assert_eq!(
            a.parse("stop light mode", false, false),
            Command::LightMode(Some(false))
        );
    }

    #[test]
    fn test_rule3_light_mode() {
        let a = arbiter();
        assert_eq!(a.parse("light mode on", false, false), Command::LightMode(Some(true)));
        assert_eq!(a.parse("start light sensor", false, false), Command::LightMode(Some(true)));
        assert_eq!(a.parse("light sensor off", false, false), Command::LightMode(Some(false)));
        assert_eq!(a.parse("light mode", false, false), Command::LightMode(None));
        // "light" alone is not a mode command
        assert_eq!(a.parse("find light", false, false), Command::Find { target: "light".into() });
    }

    #[test]
    fn test_rule5_cancel_only_during_fall() {
        let a = arbiter();
        assert_eq!(a.parse("ok", false, true), Command::CancelEmergency);
        assert_eq!(a.parse("cancel describe", false, true), Command::CancelEmergency);
        assert_eq!(a.parse("ok", false, false), Command::NotRecognized);
    }

    #[test]
    fn test_rule6_cloud_prompts() {
        let a = arbiter();
        assert_eq!(
            a.parse("describe what's in front of me", false, false),
            Command::Describe { prompt: "what's in front of me".into() }
        );
        assert_eq!(
            a.parse("Gemini, is the road clear", false, false),
            Command::Describe { prompt: "is the road clear".into() }
        );
        assert_eq!(
            a.parse("gemini", false, false),
            Command::Describe { prompt: DEFAULT_PROMPT.into() }
        );
        // the wake word beats "find"
        assert_eq!(
            a.parse("gemini find my keys", false, false),
            Command::Describe { prompt: "find my keys".into() }
        );
    }

    #[test]
    fn test_rule7_find() {
        let a = arbiter();
        assert_eq!(a.parse("Find bottle", false, false), Command::Find { target: "bottle".into() });
        assert_eq!(a.parse("find", false, false), Command::NotRecognized);
    }

    #[test]
    fn test_rule8_read() {
        let a = arbiter();
        assert_eq!(a.parse("read the sign", false, false), Command::ReadText);
        assert_eq!(a.parse("Read", false, false), Command::ReadText);
    }

    #[test]
    fn test_rule9_fallback() {
        assert_eq!(arbiter().parse("xyz nonsense", false, false), Command::NotRecognized);
        assert_eq!(arbiter().parse("", false, false), Command::NotRecognized);
    }

    #[test]
    fn test_find_bottle_scenario() {
        let store = store();
        let outcome = arbiter().interpret(&store, "find bottle");

        let snap = store.snapshot();
        assert_eq!(snap.modes.target_object.as_deref(), Some("bottle"));
        assert!(!snap.modes.target_text);
        assert_eq!(snap.ui, UiState::processing("Looking for bottle..."));
        assert_eq!(outcome.speech.as_deref(), Some("Looking for bottle..."));
    }

    #[test]
    fn test_describe_scenario() {
        let store = store();
        store.update_modes(|m| m.target_object = Some("door".into()));

        let outcome = arbiter().interpret(&store, "describe what's in front of me");

        let snap = store.snapshot();
        assert_eq!(
            snap.ui,
            UiState::Success { text: CAPTURE_PHOTO.into(), bounds: Rect::default() }
        );
        assert_eq!(snap.modes.last_cloud_prompt, "what's in front of me");
        assert!(!snap.modes.has_reflex_target());
        assert_eq!(outcome.speech, None);
    }

    #[test]
    fn test_nonsense_scenario() {
        let store = store();
        let outcome = arbiter().interpret(&store, "xyz nonsense");
        assert_eq!(store.ui(), UiState::error(NOT_UNDERSTOOD));
        assert!(store.ui().to_string().contains("Sorry, I didn't understand"));
        assert_eq!(outcome.speech.as_deref(), Some(NOT_UNDERSTOOD));
    }

    #[test]
    fn test_read_clears_object_target() {
        let store = store();
        arbiter().interpret(&store, "find door");
        arbiter().interpret(&store, "read");

        let snap = store.snapshot();
        assert_eq!(snap.modes.target_object, None);
        assert!(snap.modes.target_text);
        assert_eq!(snap.ui, UiState::processing(LOOKING_FOR_TEXT));
    }

    #[test]
    fn test_toggles_leave_ui_untouched() {
        let store = store();
        store.set_ui(UiState::error("previous"));
        let generation = store.generation();

        let outcome = arbiter().interpret(&store, "who is in front of me");
        assert!(store.modes().face_mode_on);
        assert_eq!(outcome.speech.as_deref(), Some("Looking for people..."));

        arbiter().interpret(&store, "stop");
        assert!(!store.modes().face_mode_on);

        arbiter().interpret(&store, "light mode on");
        assert!(store.modes().light_mode_on);

        assert_eq!(store.ui(), UiState::error("previous"));
        assert_eq!(store.generation(), generation);
    }

    #[test]
    fn test_cancel_during_fall() {
        let store = store();
        store.set_ui(UiState::FallDetected);

        let outcome = arbiter().interpret(&store, "I'm ok");
        assert_eq!(outcome.command, Command::CancelEmergency);
        assert_eq!(store.ui(), UiState::Idle);
        assert_eq!(outcome.speech.as_deref(), Some("SOS Cancelled."));
    }
}
