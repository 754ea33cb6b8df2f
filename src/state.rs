//! Session state types
//!
//! `UiState` is the single value describing what the user is being shown
//! and told. `ModeFlags` holds the perception modes armed by voice commands.
//! Both travel together in a `Snapshot` so observers never see one without
//! the other.

use std::fmt;
use std::str::FromStr;

/// Sentinel text asking the session to capture a frame for the cloud.
pub const CAPTURE_PHOTO: &str = "CAPTURE_PHOTO";

/// Axis-aligned rectangle in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i64 {
        i64::from(self.right) - i64::from(self.left)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.bottom) - i64::from(self.top)
    }

    /// An empty rect carries no highlight
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn center_x(&self) -> i64 {
        i64::from(self.left) + self.width() / 2
    }
}

/// Where a detected object sits horizontally in the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Center,
}

impl Direction {
    /// Classify a box by which third of the frame holds its centre
    pub fn from_bounds(bounds: &Rect, frame_width: i32) -> Self {
        if frame_width <= 0 {
            return Direction::Center;
        }
        let center = bounds.center_x();
        let frame_width = i64::from(frame_width);
        if center < frame_width / 3 {
            Direction::Left
        } else if center > frame_width * 2 / 3 {
            Direction::Right
        } else {
            Direction::Center
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "Left",
            Direction::Right => "Right",
            Direction::Center => "Center",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" | "l" => Ok(Direction::Left),
            "right" | "r" => Ok(Direction::Right),
            "center" | "centre" | "c" | "ahead" => Ok(Direction::Center),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// What the user is currently shown and told. Exactly one is active.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UiState {
    #[default]
    Idle,
    Listening,
    Processing(String),
    FallDetected,
    Success { text: String, bounds: Rect },
    Error(String),
}

impl UiState {
    pub fn processing(message: impl Into<String>) -> Self {
        UiState::Processing(message.into())
    }

    pub fn success(text: impl Into<String>) -> Self {
        UiState::Success {
            text: text.into(),
            bounds: Rect::default(),
        }
    }

    pub fn success_at(text: impl Into<String>, bounds: Rect) -> Self {
        UiState::Success {
            text: text.into(),
            bounds,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        UiState::Error(message.into())
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, UiState::Processing(_))
    }

    pub fn is_fall_detected(&self) -> bool {
        matches!(self, UiState::FallDetected)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UiState::Success { .. })
    }

    /// True for the photo-capture sentinel produced by cloud commands
    pub fn is_capture_request(&self) -> bool {
        matches!(self, UiState::Success { text, .. } if text == CAPTURE_PHOTO)
    }
}

impl fmt::Display for UiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiState::Idle => f.write_str("Tap anywhere to speak."),
            UiState::Listening => f.write_str("Listening..."),
            UiState::Processing(message) => f.write_str(message),
            UiState::FallDetected => f.write_str("FALL DETECTED! Tap or say 'Stop' to cancel"),
            UiState::Success { text, .. } => f.write_str(text),
            UiState::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

/// Perception modes armed by voice commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeFlags {
    pub face_mode_on: bool,
    pub light_mode_on: bool,
    /// Object the reflex detectors are searching for
    pub target_object: Option<String>,
    /// Reflex detectors are waiting for readable text
    pub target_text: bool,
    /// Question sent with the next captured photo
    pub last_cloud_prompt: String,
}

impl ModeFlags {
    pub fn new(default_prompt: impl Into<String>) -> Self {
        Self {
            face_mode_on: false,
            light_mode_on: false,
            target_object: None,
            target_text: false,
            last_cloud_prompt: default_prompt.into(),
        }
    }

    pub fn has_reflex_target(&self) -> bool {
        self.target_object.is_some() || self.target_text
    }

    pub fn clear_reflex_targets(&mut self) {
        self.target_object = None;
        self.target_text = false;
    }
}

/// Immutable view of the session after one transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub ui: UiState,
    pub modes: ModeFlags,
    /// Bumped on every `UiState` write; delayed actions compare against it
    pub generation: u64,
}
