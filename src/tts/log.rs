//! Log-only TTS engine for headless runs

use super::TtsEngine;
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Default)]
pub struct LogEngine;

impl LogEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TtsEngine for LogEngine {
    async fn speak(&self, text: &str) -> Result<()> {
        info!("🔊 {}", text);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
