//! ASR (Automatic Speech Recognition) Module
//!
//! Speech capture is owned by the platform; the session only asks for one
//! utterance at a time.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// One round of voice capture
#[async_trait]
pub trait UtteranceSource: Send + Sync + Debug {
    /// Record until the user stops talking.
    ///
    /// Returns `Ok(None)` when the round was cancelled or heard nothing.
    async fn capture_utterance(&self) -> Result<Option<String>>;
}

/// Blank or whitespace-only transcripts count as silence
pub fn non_blank(transcript: Option<String>) -> Option<String> {
    transcript.filter(|t| !t.trim().is_empty())
}
