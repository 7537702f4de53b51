//! Graph construction processor

use crate::descriptor::model::Descriptor;
use crate::error::Result;
use crate::graph::AppGraph;
use crate::pipeline::Processor;

/// Builds the dependency graph from declared links. Runs last: the
/// topology it produces is what command traversal relies on.
pub struct Graphize;

impl Processor for Graphize {
    fn name(&self) -> &'static str {
        "graphize"
    }

    fn process(&self, descriptor: &mut Descriptor) -> Result<()> {
        descriptor.graph = AppGraph::build(&mut descriptor.applications)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StaveError;

    #[test]
    fn test_graph_attached_to_descriptor() {
        let mut descriptor = Descriptor::from_yaml(
            "applications:\n  - name: web\n    image: i\n    links: [db]\n  - name: db\n    image: j\n",
        )
        .unwrap();
        assert!(descriptor.graph.is_empty());

        Graphize.process(&mut descriptor).unwrap();

        assert_eq!(descriptor.graph.roots(), ["web"]);
        assert_eq!(descriptor.application("web").unwrap().dependencies, vec!["db"]);
        assert!(descriptor.application("db").unwrap().has_dependents);
    }

    #[test]
    fn test_cycle_surfaces_as_semantic_error() {
        let mut descriptor = Descriptor::from_yaml(
            "applications:\n  - name: a\n    image: i\n    links: [b]\n  - name: b\n    image: j\n    links: [a]\n",
        )
        .unwrap();
        let err = Graphize.process(&mut descriptor).unwrap_err();
        assert!(matches!(err, StaveError::Semantic(_)));
    }
}
