//! Canonical descriptor model
//!
//! Every shorthand accepted on the wire is resolved into the structured
//! types here during decoding, so processors and channels only ever see one
//! shape.

use crate::answers::AnswerSet;
use crate::error::{Result, StaveError};
use crate::graph::AppGraph;
use serde::{Deserialize, Serialize};

/// Canonicalized compose document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Descriptor {
    /// Catalog metadata block.
    pub catalog: Catalog,
    /// Applications in document order.
    pub applications: Vec<Application>,
    /// Answers seeded by the engine before the pipeline runs.
    pub answers: AnswerSet,
    /// Dependency graph; empty until the graphize processor runs.
    pub graph: AppGraph,
}

impl Descriptor {
    /// Look up an application by name.
    pub fn application(&self, name: &str) -> Option<&Application> {
        self.applications.iter().find(|a| a.name == name)
    }

    /// Variables of required catalog questions that have neither a default
    /// nor an answer. Must be empty before command dispatch.
    pub fn unanswered_questions(&self) -> Vec<String> {
        self.catalog
            .questions
            .iter()
            .filter(|q| q.required && q.default.is_empty() && !self.answers.contains(&q.variable))
            .map(|q| q.variable.clone())
            .collect()
    }
}

/// Catalog metadata and its questions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub minimum_engine_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Question>,
}

/// A question the answer set is expected to resolve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variable: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    /// Value type of the expected answer.
    #[serde(rename = "type", default)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default: String,
    /// Permitted values; meaningful only when `kind` is `enum`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// Question value type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    #[default]
    String,
    Int,
    Bool,
    Enum,
}

/// A single application definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Application {
    pub name: String,
    pub image: String,
    pub entrypoint: String,
    /// Command in its original arity (scalar or list).
    pub command: Option<Command>,
    /// Environment pairs; map-form input is sorted by key, list-form order
    /// is preserved.
    pub environment: Vec<KeyValue>,
    /// Labels, same shape rules as environment.
    pub labels: Vec<KeyValue>,
    pub volumes: Vec<Volume>,
    pub ports: Vec<Port>,
    pub links: Vec<Link>,
    pub expose: Vec<u32>,
    /// Network mode, `bridge` or `host`.
    pub net: String,
    /// Restart policy, interpreted by the target channel.
    pub restart: String,
    pub orchestrator_config: OrchestratorConfig,
    /// True when at least one other application links this one.
    /// Derived by graphize; never serialized.
    pub has_dependents: bool,
    /// Status-time flag; stays false on the descriptor, the command layer
    /// reports liveness through its own status map.
    pub meets_criteria: bool,
    /// Resolved dependency names in link order. Derived by graphize.
    pub dependencies: Vec<String>,
}

/// Command field: a shell string or an exec-style list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Single(String),
    Many(Vec<String>),
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Single(s) => write!(f, "{}", s),
            Command::Many(parts) => write!(f, "{}", parts.join(" ")),
        }
    }
}

/// One environment or label entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Orchestrator-specific resource parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub cluster_id: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_version: String,
    #[serde(default)]
    pub cpu: f32,
    #[serde(default)]
    pub mem: f32,
    #[serde(default)]
    pub instances: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_paths: Vec<String>,
}

/// Port mapping resolved from colon-delimited shorthand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Port {
    pub host_addr: String,
    pub host_port: String,
    pub container_addr: String,
    pub container_port: String,
    pub protocol: String,
}

impl Port {
    /// Parse port shorthand: `X`, `H:C` or `A:H:C`, with an optional
    /// trailing `/protocol`.
    pub fn parse(entry: &str) -> Result<Self> {
        let (mapping, protocol) = match entry.rsplit_once('/') {
            Some((mapping, proto)) => (mapping, proto.to_string()),
            None => (entry, String::new()),
        };

        let segments: Vec<&str> = mapping.split(':').collect();
        let mut port = match segments.as_slice() {
            [single] => Port {
                host_port: (*single).to_string(),
                container_port: (*single).to_string(),
                ..Port::default()
            },
            [host, container] => Port {
                host_port: (*host).to_string(),
                container_port: (*container).to_string(),
                ..Port::default()
            },
            [addr, host, container] => Port {
                host_addr: (*addr).to_string(),
                host_port: (*host).to_string(),
                container_port: (*container).to_string(),
                ..Port::default()
            },
            _ => {
                return Err(StaveError::Schema(format!(
                    "port '{}' has too many ':' segments (at most addr:host:container)",
                    entry
                )))
            }
        };
        port.protocol = protocol;

        check_port_number(&port.host_port, entry)?;
        check_port_number(&port.container_port, entry)?;
        Ok(port)
    }

    /// Canonical shorthand form; `parse(shorthand())` restores the value.
    pub fn shorthand(&self) -> String {
        let mapping = if !self.host_addr.is_empty() {
            format!("{}:{}:{}", self.host_addr, self.host_port, self.container_port)
        } else if self.host_port == self.container_port {
            self.container_port.clone()
        } else {
            format!("{}:{}", self.host_port, self.container_port)
        };
        if self.protocol.is_empty() {
            mapping
        } else {
            format!("{}/{}", mapping, self.protocol)
        }
    }
}

fn check_port_number(segment: &str, entry: &str) -> Result<()> {
    if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
        return Err(StaveError::Semantic(format!(
            "port '{}': '{}' is not a non-negative integer",
            entry, segment
        )));
    }
    Ok(())
}

/// Volume mount resolved from `host:container[:mode]` shorthand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub container: String,
    pub host: String,
    /// Access mode, always lower case; defaults to `rw`.
    pub permission: String,
}

impl Default for Volume {
    fn default() -> Self {
        Self {
            container: String::new(),
            host: String::new(),
            permission: "rw".to_string(),
        }
    }
}

impl Volume {
    /// Parse volume shorthand: `H:C` or `H:C:mode`.
    pub fn parse(entry: &str) -> Result<Self> {
        let segments: Vec<&str> = entry.split(':').collect();
        match segments.as_slice() {
            [host, container] => Ok(Volume {
                host: (*host).to_string(),
                container: (*container).to_string(),
                permission: "rw".to_string(),
            }),
            // an empty trailing segment ("h:c:") is malformed, not defaulted
            [host, container, mode] if !mode.is_empty() => Ok(Volume {
                host: (*host).to_string(),
                container: (*container).to_string(),
                permission: mode.to_ascii_lowercase(),
            }),
            _ => Err(StaveError::Schema(format!(
                "volume '{}' must be host:container or host:container:mode",
                entry
            ))),
        }
    }

    /// Canonical shorthand form, mode always spelled out.
    pub fn shorthand(&self) -> String {
        format!("{}:{}:{}", self.host, self.container, self.permission)
    }
}

/// Link to another application, optionally aliased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    /// Name of the linked application.
    pub from: String,
    /// Alias the link is exposed under.
    pub target: String,
}

impl Link {
    /// Parse link shorthand: `X` or `X:Y`.
    pub fn parse(entry: &str) -> Result<Self> {
        let segments: Vec<&str> = entry.split(':').collect();
        match segments.as_slice() {
            [name] => Ok(Link {
                from: (*name).to_string(),
                target: (*name).to_string(),
            }),
            [from, target] => Ok(Link {
                from: (*from).to_string(),
                target: (*target).to_string(),
            }),
            _ => Err(StaveError::Schema(format!(
                "link '{}' must be name or name:alias",
                entry
            ))),
        }
    }

    /// Canonical shorthand form.
    pub fn shorthand(&self) -> String {
        if self.from == self.target {
            self.from.clone()
        } else {
            format!("{}:{}", self.from, self.target)
        }
    }
}
