//! Descriptor model and codec
//!
//! This module owns the canonical in-memory form of a compose document and
//! the YAML/JSON codec that produces it, shorthand normalization included.

pub mod decode;
pub mod model;
pub mod raw;

pub use decode::SourceFormat;
pub use model::{
    Application, Catalog, Command, Descriptor, KeyValue, Link, OrchestratorConfig, Port, Question,
    QuestionKind, Volume,
};
pub use raw::RawDescriptor;
