//! Agent MRI Core
//!
//! Foundational error types and the run-step model for the Agent MRI
//! workspace. This crate has zero dependencies on the analysis pipeline or
//! any front end.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `step` - Run step model (`Step`, `StepKind`)
//!
//! ## Design Principles
//!
//! 1. **Zero external dependencies beyond serde/thiserror** - keeps build times minimal
//! 2. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod error;
pub mod step;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Step Model ─────────────────────────────────────────────────────────
pub use step::{Step, StepKind};
