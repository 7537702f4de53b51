//! Stave - application descriptor compiler and deployment driver
//!
//! Stave turns a declarative application descriptor (YAML or JSON) into a
//! processed, dependency-ordered deployment plan and drives it through a
//! cluster channel. It provides:
//!
//! - Two-phase descriptor decoding with strict top-level schema checks
//! - A processor pipeline (interpolation, unit defaults, orchestrator
//!   parameters, graph construction) with pluggable extra processors
//! - A dependency graph with deterministic ordering
//! - Lifecycle verbs (create, up, status, stop, restart, scale) executed
//!   over HTTP with retry and cancellation

pub mod answers;
pub mod channel;
pub mod command;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod graph;
pub mod pipeline;

pub use answers::AnswerSet;
pub use command::{CommandOutcome, ExecuteOptions, ScaleOptions, Verb};
pub use descriptor::{Descriptor, SourceFormat};
pub use engine::Engine;
pub use error::{Result, StaveError};
pub use graph::AppGraph;
