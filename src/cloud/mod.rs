//! Cloud Vision Module
//!
//! The "expert" path: a captured frame plus the user's question is sent to
//! a hosted vision-language model. Only explicit wake phrases reach it.

pub mod gemini;

use crate::camera::CapturedImage;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

pub use gemini::GeminiClient;

/// Trait for cloud vision backends
#[async_trait]
pub trait VisionService: Send + Sync + Debug {
    /// Describe `image` in answer to `question`
    async fn describe(&self, image: &CapturedImage, question: &str) -> Result<String>;

    /// Get the backend name
    fn name(&self) -> &str;
}

/// Navigation persona wrapped around every user question
pub fn build_instruction(question: &str) -> String {
    format!(
        r#"You are an assistant for a visually impaired person.
Your goal is to provide clear, concise, and safe instructions.
Be direct and use simple language.
The wake word that started this request is not part of the question; do not repeat it.
Prioritize safe navigation: always mention obstructions and nearby objects.
If any object is directly in front, warn the user first.
Give precise directions and the approximate number of steps needed to reach what the user asked for.
Do not use descriptive or flowery language.
Focus on navigation, obstacles, and safety.

Based on the image, answer this user's question: "{question}""#
    )
}
