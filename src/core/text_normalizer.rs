//! Text Normalization
//!
//! Cleans recognizer output before command matching. Casing is kept so
//! search targets and cloud questions reach the detectors as spoken.

/// Conversational openers dropped from the front of an utterance
const FILLERS: &[&str] = &["um", "uh", "hey", "please", "so", "hmm"];

/// Normalizes spoken text before it reaches the arbiter
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Collapse whitespace, trim trailing punctuation and leading fillers
    pub fn normalize(&self, text: &str) -> String {
        let mut words: Vec<&str> = text.split_whitespace().collect();

        while let Some(first) = words.first() {
            let bare = first
                .trim_end_matches(|c: char| c == ',' || c == '.')
                .to_lowercase();
            if FILLERS.contains(&bare.as_str()) && words.len() > 1 {
                words.remove(0);
            } else {
                break;
            }
        }

        words
            .join(" ")
            .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?'))
            .trim()
            .to_string()
    }
}

/// Strip `prefix` from the front of `text`, ignoring case, if it ends on a
/// word boundary. Returns the remainder with separators trimmed.
pub fn strip_word_prefix<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = &text[prefix.len()..];
    match rest.chars().next() {
        Some(c) if c.is_alphanumeric() => None,
        _ => Some(rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == ':')),
    }
}
