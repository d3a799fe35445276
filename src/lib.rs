//! # essay-grader
//!
//! An HTTP service that grades a student's answer against a teacher's rubric
//! by asking an LLM for a per-point score breakdown.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Runtime configuration read from the environment
pub mod config;
/// A module defining constant values used throughout
pub mod constants;
/// Loading and serving the API documentation
pub mod docs;
/// Prompt construction, model invocation, and response parsing
pub mod grade;
/// HTTP routes and handlers
pub mod server;
/// Request and response shapes
pub mod types;

pub use config::{GeneratorEnv, ServerConfig};
pub use grade::{Grader, OpenAiGenerator, TextGenerator};
pub use server::{AppState, router};
pub use types::{GradeReport, GradeRequest, GradeResult, RubricBreakdownItem};
