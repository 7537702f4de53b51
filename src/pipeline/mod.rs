//! Processor pipeline
//!
//! An ordered sequence of transformations applied to a decoded descriptor.
//! The built-in order is part of the engine contract: interpolation first so
//! every later processor sees substituted strings, graphize last because it
//! freezes the topology.

pub mod graphize;
pub mod interpolate;
pub mod params;
pub mod units;

pub use graphize::Graphize;
pub use interpolate::Interpolate;
pub use params::{ClusterId, OrchestratorParams};
pub use units::StandardizeUnits;

use crate::descriptor::model::Descriptor;
use crate::error::{Result, StaveError};

/// One transformation step. Implementations must be deterministic and
/// idempotent so the pipeline can be re-run on an already-compiled
/// descriptor without changing it.
pub trait Processor: Send + Sync {
    /// Stable name, used as a registration anchor and in error reports.
    fn name(&self) -> &'static str;
    /// Transform the descriptor in place.
    fn process(&self, descriptor: &mut Descriptor) -> Result<()>;
}

/// Placement of a custom processor relative to already-registered ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Before(&'static str),
    After(&'static str),
    Last,
}

/// Ordered processor registry owned by the engine. No process-wide state:
/// independent engines carry independent pipelines.
pub struct Pipeline {
    processors: Vec<Box<dyn Processor>>,
}

impl Pipeline {
    /// The built-in processors in their contractual order.
    pub fn standard() -> Self {
        Pipeline {
            processors: vec![
                Box::new(Interpolate::new()),
                Box::new(StandardizeUnits),
                Box::new(OrchestratorParams),
                Box::new(ClusterId),
                Box::new(Graphize),
            ],
        }
    }

    /// Insert a custom processor. Fails when the anchor names no registered
    /// processor.
    pub fn register(&mut self, processor: Box<dyn Processor>, position: Position) -> Result<()> {
        let index = match position {
            Position::Before(anchor) => self.position_of(anchor)?,
            Position::After(anchor) => self.position_of(anchor)? + 1,
            Position::Last => self.processors.len(),
        };
        self.processors.insert(index, processor);
        Ok(())
    }

    fn position_of(&self, anchor: &str) -> Result<usize> {
        self.processors
            .iter()
            .position(|p| p.name() == anchor)
            .ok_or_else(|| {
                StaveError::Config(format!("no processor named '{}' to anchor on", anchor))
            })
    }

    /// Processor names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Run every processor in order. The first failure aborts the pipeline
    /// and carries the processor's name and position.
    pub fn run(&self, descriptor: &mut Descriptor) -> Result<()> {
        for (index, processor) in self.processors.iter().enumerate() {
            tracing::debug!(processor = processor.name(), index, "running processor");
            processor
                .process(descriptor)
                .map_err(|e| StaveError::Processor {
                    name: processor.name(),
                    index,
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct Failing;

    impl Processor for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn process(&self, _descriptor: &mut Descriptor) -> Result<()> {
            Err(StaveError::Semantic("boom".to_string()))
        }
    }

    struct Recording(Arc<AtomicBool>);

    impl Processor for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }
        fn process(&self, _descriptor: &mut Descriptor) -> Result<()> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_standard_order() {
        assert_eq!(
            Pipeline::standard().names(),
            vec![
                "interpolate",
                "standardize-units",
                "orchestrator-params",
                "cluster-id",
                "graphize"
            ]
        );
    }

    #[test]
    fn test_register_before_and_after() {
        let ran = Arc::new(AtomicBool::new(false));

        let mut pipeline = Pipeline::standard();
        pipeline
            .register(Box::new(Recording(ran.clone())), Position::Before("graphize"))
            .unwrap();
        assert_eq!(pipeline.names()[4], "recording");

        let mut pipeline = Pipeline::standard();
        pipeline
            .register(Box::new(Recording(ran.clone())), Position::After("interpolate"))
            .unwrap();
        assert_eq!(pipeline.names()[1], "recording");

        let mut pipeline = Pipeline::standard();
        pipeline
            .register(Box::new(Recording(ran.clone())), Position::Last)
            .unwrap();
        assert_eq!(*pipeline.names().last().unwrap(), "recording");

        let mut descriptor = Descriptor::default();
        pipeline.run(&mut descriptor).unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_register_unknown_anchor() {
        let mut pipeline = Pipeline::standard();
        let err = pipeline
            .register(Box::new(Failing), Position::Before("no-such"))
            .unwrap_err();
        assert!(matches!(err, StaveError::Config(_)));
    }

    #[test]
    fn test_failure_carries_name_and_position() {
        let mut pipeline = Pipeline::standard();
        pipeline
            .register(Box::new(Failing), Position::After("standardize-units"))
            .unwrap();

        let mut descriptor = Descriptor::default();
        let err = pipeline.run(&mut descriptor).unwrap_err();
        match err {
            StaveError::Processor { name, index, .. } => {
                assert_eq!(name, "failing");
                assert_eq!(index, 2);
            }
            other => panic!("expected processor error, got {}", other),
        }
    }

    #[test]
    fn test_interpolation_runs_before_param_assignment() {
        let mut descriptor = Descriptor::from_yaml(
            "applications:\n  - name: web\n    image: \"${image_version}\"\n",
        )
        .unwrap();
        descriptor.answers.insert("image_version", "1.2");

        Pipeline::standard().run(&mut descriptor).unwrap();

        let web = descriptor.application("web").unwrap();
        assert_eq!(web.image, "1.2");
        assert_eq!(web.orchestrator_config.image_version, "1.2");
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let mut descriptor = Descriptor::from_yaml(
            "applications:\n  - name: web\n    image: \"img:${tag}\"\n    links: [db]\n  - name: db\n    image: postgres\n",
        )
        .unwrap();
        descriptor.answers.insert("tag", "9");

        let pipeline = Pipeline::standard();
        pipeline.run(&mut descriptor).unwrap();
        let once = descriptor.clone();
        pipeline.run(&mut descriptor).unwrap();
        assert_eq!(descriptor, once);
    }
}
