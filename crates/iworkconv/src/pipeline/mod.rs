//! Conversion pipeline: the engine seam and the orchestrator driving jobs
//! from submission to a stored artifact.

pub mod converter;
pub mod orchestrator;

pub use converter::{Converter, UnconfiguredConverter};
pub use orchestrator::Orchestrator;
