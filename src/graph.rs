//! Application dependency graph
//!
//! Built once by the graphize processor from declared links. The graph keys
//! applications by name rather than holding references, so the descriptor
//! stays the single owner of application records.

use crate::descriptor::model::Application;
use crate::error::{Result, StaveError};
use std::collections::{BTreeMap, HashSet};

/// A link whose target is not defined in the descriptor. Kept as a warning
/// so descriptors may reference externally managed applications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenLink {
    /// Application that declared the link
    pub application: String,
    /// Name the link failed to resolve
    pub target: String,
}

/// Dependency graph over the applications of one descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppGraph {
    /// Application names in descriptor order
    order: Vec<String>,
    /// Resolved dependencies per application, link order, deduplicated
    edges: BTreeMap<String, Vec<String>>,
    /// Inbound edges per application
    inbound: BTreeMap<String, Vec<String>>,
    /// Applications with no inbound edges, descriptor order
    roots: Vec<String>,
    /// Links that resolved to nothing
    open_links: Vec<OpenLink>,
}

impl AppGraph {
    /// Resolve links into edges, set each application's `dependencies` and
    /// `has_dependents`, and verify the result is acyclic.
    pub fn build(applications: &mut [Application]) -> Result<AppGraph> {
        let mut names: HashSet<&str> = HashSet::new();
        for app in applications.iter() {
            if !names.insert(app.name.as_str()) {
                return Err(StaveError::Semantic(format!(
                    "duplicate application name '{}'",
                    app.name
                )));
            }
        }

        let mut graph = AppGraph::default();
        for app in applications.iter() {
            graph.order.push(app.name.clone());

            let mut dependencies: Vec<String> = Vec::new();
            for link in &app.links {
                if !names.contains(link.from.as_str()) {
                    tracing::warn!(
                        application = %app.name,
                        target = %link.from,
                        "link target not defined in descriptor, leaving edge open"
                    );
                    graph.open_links.push(OpenLink {
                        application: app.name.clone(),
                        target: link.from.clone(),
                    });
                    continue;
                }
                if !dependencies.contains(&link.from) {
                    dependencies.push(link.from.clone());
                }
            }
            graph.edges.insert(app.name.clone(), dependencies);
        }

        for (from, dependencies) in &graph.edges {
            for to in dependencies {
                graph
                    .inbound
                    .entry(to.clone())
                    .or_default()
                    .push(from.clone());
            }
        }

        graph.roots = graph
            .order
            .iter()
            .filter(|name| graph.dependents_of(name).is_empty())
            .cloned()
            .collect();

        graph.check_acyclic()?;

        for app in applications.iter_mut() {
            app.dependencies = graph.dependencies_of(&app.name).to_vec();
            app.has_dependents = !graph.dependents_of(&app.name).is_empty();
        }

        Ok(graph)
    }

    /// Applications with no inbound edges, in descriptor order.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Resolved dependencies of one application.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Applications that link the given one.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.inbound.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Links that did not resolve to a defined application.
    pub fn open_links(&self) -> &[OpenLink] {
        &self.open_links
    }

    /// True before graphize has run.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Dependency-first ordering of all applications. Deterministic: ties
    /// follow descriptor order.
    pub fn topological_order(&self) -> Vec<String> {
        let mut order = Vec::with_capacity(self.order.len());
        let mut visited: HashSet<String> = HashSet::new();
        for name in &self.order {
            self.visit_post_order(name, &mut visited, &mut order);
        }
        order
    }

    /// Dependents-first ordering, used when tearing applications down.
    pub fn reverse_topological_order(&self) -> Vec<String> {
        let mut order = self.topological_order();
        order.reverse();
        order
    }

    fn visit_post_order(&self, name: &str, visited: &mut HashSet<String>, order: &mut Vec<String>) {
        if visited.contains(name) {
            return;
        }
        visited.insert(name.to_string());
        for dependency in self.dependencies_of(name) {
            self.visit_post_order(dependency, visited, order);
        }
        order.push(name.to_string());
    }

    fn check_acyclic(&self) -> Result<()> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut visiting: HashSet<String> = HashSet::new();
        let mut path: Vec<String> = Vec::new();
        for name in &self.order {
            self.visit_for_cycles(name, &mut visited, &mut visiting, &mut path)?;
        }
        Ok(())
    }

    fn visit_for_cycles(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Result<()> {
        if visited.contains(name) {
            return Ok(());
        }
        if visiting.contains(name) {
            let start = path.iter().position(|n| n == name).unwrap_or(0);
            let mut cycle: Vec<&str> = path[start..].iter().map(String::as_str).collect();
            cycle.push(name);
            return Err(StaveError::Semantic(format!(
                "dependency cycle: {}",
                cycle.join(" -> ")
            )));
        }

        visiting.insert(name.to_string());
        path.push(name.to_string());
        for dependency in self.dependencies_of(name) {
            self.visit_for_cycles(dependency, visited, visiting, path)?;
        }
        path.pop();
        visiting.remove(name);
        visited.insert(name.to_string());

        Ok(())
    }
}
