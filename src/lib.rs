//! SightGuide Library
//!
//! Session core for a voice-driven navigation assistant: command
//! arbitration, perception routing and the UI/output state machine.

pub mod asr;
pub mod audit;
pub mod camera;
pub mod cloud;
pub mod config;
pub mod console;
pub mod core;
pub mod emergency;
pub mod error;
pub mod haptics;
pub mod perception;
pub mod sensors;
pub mod session;
pub mod state;
pub mod store;
pub mod tts;
pub mod utils;
