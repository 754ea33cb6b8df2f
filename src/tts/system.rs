//! System fallback TTS engine
//!
//! Shells out to `spd-say` or `espeak-ng`. The running child is kept so a
//! new utterance or `stop` can cut it off.

use super::TtsEngine;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

const COMMANDS: &[&str] = &["spd-say", "espeak-ng"];

#[derive(Debug, Default)]
pub struct SystemEngine {
    current: Mutex<Option<Child>>,
}

impl SystemEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the running child and flush speech-dispatcher before returning
    async fn interrupt(&self) -> Result<()> {
        let child = self
            .current
            .lock()
            .map_err(|e| anyhow::anyhow!("{}", e))?
            .take();
        if let Some(mut child) = child {
            if let Err(e) = child.kill().await {
                warn!("🔇 Could not stop speech process: {}", e);
            }
        }

        // speech-dispatcher keeps talking after the client exits
        match Command::new("spd-say").arg("--cancel").status().await {
            Ok(status) if !status.success() => debug!("spd-say --cancel exited with {}", status),
            Ok(_) => {}
            Err(e) => debug!("spd-say --cancel unavailable: {}", e),
        }
        Ok(())
    }
}

#[async_trait]
impl TtsEngine for SystemEngine {
    async fn speak(&self, text: &str) -> Result<()> {
        debug!("System speaking: {}", text);
        self.interrupt().await?;

        for program in COMMANDS {
            if let Ok(child) = Command::new(program).arg(text).kill_on_drop(true).spawn() {
                let mut current = self.current.lock().map_err(|e| anyhow::anyhow!("{}", e))?;
                *current = Some(child);
                return Ok(());
            }
        }

        Err(anyhow::anyhow!(
            "No system TTS command found (tried spd-say, espeak-ng)"
        ))
    }

    async fn stop(&self) -> Result<()> {
        self.interrupt().await
    }

    fn name(&self) -> &str {
        "system"
    }
}
