//! Wire-format descriptor shapes
//!
//! These types mirror the YAML/JSON surface, shorthand forms included. The
//! decoder lowers them into the canonical model in one direction and the
//! encoder raises canonical values back for re-serialization.

use crate::answers::AnswerSet;
use crate::descriptor::model::{
    Application, Catalog, Command, Descriptor, KeyValue, OrchestratorConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level document. Strict: unknown keys are a schema error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDescriptor {
    /// Catalog metadata block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Catalog>,
    /// Application definitions in document order
    #[serde(default)]
    pub applications: Vec<RawApplication>,
    /// Inline answers, merged under caller-supplied ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<AnswerSet>,
}

/// One application as written on the wire. Unknown keys are tolerated here
/// so descriptors written for richer engines still decode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawApplication {
    /// Application name
    #[serde(default)]
    pub name: String,
    /// Image reference
    #[serde(default)]
    pub image: String,
    /// Entrypoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    /// Command, shell string or exec list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    /// Environment variables, list or map form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<RawKeyValues>,
    /// Labels, same forms as environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<RawKeyValues>,
    /// Volume shorthands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<String>>,
    /// Port shorthands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<String>>,
    /// Link shorthands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    /// Exposed container ports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose: Option<Vec<RawExpose>>,
    /// Network mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net: Option<String>,
    /// Alias for `net`; wins when both are present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    /// Restart policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    /// Orchestrator resource parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_config: Option<OrchestratorConfig>,
}

/// Environment/label forms
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawKeyValues {
    /// Array of KEY=value strings, order preserved
    List(Vec<String>),
    /// Map of key to value, canonicalized by key order
    Map(BTreeMap<String, Option<String>>),
}

impl RawKeyValues {
    /// Lower either form into the canonical ordered pair list.
    pub fn into_pairs(self) -> Vec<KeyValue> {
        match self {
            RawKeyValues::List(entries) => entries
                .into_iter()
                .map(|entry| match entry.split_once('=') {
                    Some((key, value)) => KeyValue::new(key, value),
                    None => KeyValue::new(entry, ""),
                })
                .collect(),
            RawKeyValues::Map(map) => map
                .into_iter()
                .map(|(key, value)| KeyValue::new(key, value.unwrap_or_default()))
                .collect(),
        }
    }

    /// Canonical list form, `KEY=value` per entry.
    pub fn from_pairs(pairs: &[KeyValue]) -> Self {
        RawKeyValues::List(
            pairs
                .iter()
                .map(|kv| format!("{}={}", kv.key, kv.value))
                .collect(),
        )
    }
}

/// Expose entry, numeric or quoted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawExpose {
    /// Plain number
    Number(i64),
    /// Quoted number
    Text(String),
}

impl RawApplication {
    /// Raise a canonical application back to its wire shape. Derived fields
    /// (graph back-references, status flags) are deliberately dropped.
    pub fn from_canonical(app: &Application) -> Self {
        RawApplication {
            name: app.name.clone(),
            image: app.image.clone(),
            entrypoint: some_unless_empty(&app.entrypoint),
            command: app.command.clone(),
            environment: pairs_unless_empty(&app.environment),
            labels: pairs_unless_empty(&app.labels),
            volumes: shorthands(app.volumes.iter().map(|v| v.shorthand())),
            ports: shorthands(app.ports.iter().map(|p| p.shorthand())),
            links: shorthands(app.links.iter().map(|l| l.shorthand())),
            expose: if app.expose.is_empty() {
                None
            } else {
                Some(
                    app.expose
                        .iter()
                        .map(|port| RawExpose::Number(i64::from(*port)))
                        .collect(),
                )
            },
            net: Some(app.net.clone()),
            network_mode: None,
            restart: some_unless_empty(&app.restart),
            orchestrator_config: if app.orchestrator_config == OrchestratorConfig::default() {
                None
            } else {
                Some(app.orchestrator_config.clone())
            },
        }
    }
}

impl RawDescriptor {
    pub fn from_canonical(descriptor: &Descriptor) -> Self {
        RawDescriptor {
            catalog: if descriptor.catalog == Catalog::default() {
                None
            } else {
                Some(descriptor.catalog.clone())
            },
            applications: descriptor
                .applications
                .iter()
                .map(RawApplication::from_canonical)
                .collect(),
            answers: if descriptor.answers.is_empty() {
                None
            } else {
                Some(descriptor.answers.clone())
            },
        }
    }
}

fn some_unless_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn pairs_unless_empty(pairs: &[KeyValue]) -> Option<RawKeyValues> {
    if pairs.is_empty() {
        None
    } else {
        Some(RawKeyValues::from_pairs(pairs))
    }
}

fn shorthands(entries: impl Iterator<Item = String>) -> Option<Vec<String>> {
    let entries: Vec<String> = entries.collect();
    if entries.is_empty() {
        None
    } else {
        Some(entries)
    }
}
