//! TTS (Text-to-Speech) Module
//!
//! Provides a unified interface for speech output backends. Every call to
//! `speak` interrupts whatever was being said.

use crate::config::Config;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub mod log;
pub mod system;

/// Trait for TTS engines
#[async_trait]
pub trait TtsEngine: Send + Sync + std::fmt::Debug {
    /// Speak the given text, replacing any speech in progress
    async fn speak(&self, text: &str) -> Result<()>;

    /// Interrupt the current utterance, if any
    async fn stop(&self) -> Result<()>;

    /// Get the engine name
    fn name(&self) -> &str;
}

/// Factory to create the configured TTS engine
pub fn create_engine(config: &Config) -> Arc<dyn TtsEngine> {
    info!("🛠️ Creating TTS engine: {}", config.tts_engine);
    let engine: Arc<dyn TtsEngine> = match config.tts_engine.as_str() {
        "system" => Arc::new(system::SystemEngine::new()),
        "log" | "silent" => Arc::new(log::LogEngine::new()),
        _ => {
            warn!(
                "  - Unknown engine '{}', falling back to System",
                config.tts_engine
            );
            Arc::new(system::SystemEngine::new())
        }
    };
    info!("✅ TTS engine '{}' initialized", engine.name());
    engine
}
