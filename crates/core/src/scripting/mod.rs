//! Running processor scripts against staged files.
//!
//! [`engine::ExecutionEngine`] decides what to run and how to judge the
//! outcome; [`subprocess`] owns the spawn, bounded capture and timeout
//! plumbing. Nothing here goes through a shell.

pub mod engine;
pub mod executor;
pub mod subprocess;

pub use engine::{derive_output_path, EngineConfig, ExecutionEngine};
pub use executor::{ExecutionResult, ScriptError};
