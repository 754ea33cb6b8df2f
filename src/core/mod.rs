//! Core decision modules
//!
//! Utterance interpretation, detector routing and text cleanup.

pub mod arbiter;
pub mod router;
pub mod text_normalizer;

pub use arbiter::{ArbiterOutcome, Command, CommandArbiter};
pub use router::{select_analyzer, ObjectOutcome, PerceptionRouter};
pub use text_normalizer::TextNormalizer;
