//! Mock voice capture for testing
//!
//! Hands out scripted transcripts, one per capture round.

use anyhow::Result;
use async_trait::async_trait;
use sightguide::asr::UtteranceSource;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock voice source that returns predetermined transcripts
#[derive(Debug, Default)]
pub struct MockAsr {
    /// Queue of transcripts; an empty queue means silence
    pub responses: Mutex<VecDeque<Option<String>>>,
    /// Number of capture rounds started
    pub captures: AtomicUsize,
}

impl MockAsr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transcript for the next capture round
    pub fn push(&self, text: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Some(text.to_string()));
    }

    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UtteranceSource for MockAsr {
    async fn capture_utterance(&self) -> Result<Option<String>> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(self.responses.lock().unwrap().pop_front().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_asr_returns_responses() {
        let mock = MockAsr::new();
        mock.push("find door");
        assert_eq!(mock.capture_utterance().await.unwrap().as_deref(), Some("find door"));
        assert_eq!(mock.capture_utterance().await.unwrap(), None);
        assert_eq!(mock.capture_count(), 2);
    }
}
