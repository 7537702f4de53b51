//! Descriptor decoding and canonical re-encoding
//!
//! Decoding is two-phase: the text is first parsed into a generic value
//! (syntax errors), then shaped into [`RawDescriptor`] (schema errors), then
//! lowered into the canonical model (semantic errors). Encoding reverses the
//! lowering so a canonical descriptor can be re-serialized deterministically.

use crate::descriptor::model::{Application, Descriptor, Link, Port, Volume};
use crate::descriptor::raw::{RawApplication, RawDescriptor, RawExpose};
use crate::error::{Result, StaveError};
use crate::graph::AppGraph;
use std::collections::HashSet;
use std::path::Path;

/// Source text format accepted by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Yaml,
    Json,
}

impl SourceFormat {
    /// Guess the format from a file extension; YAML unless the path says
    /// `.json`.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => SourceFormat::Json,
            _ => SourceFormat::Yaml,
        }
    }
}

impl Descriptor {
    /// Decode a YAML descriptor.
    pub fn from_yaml(text: &str) -> Result<Descriptor> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)
            .map_err(|e| StaveError::Syntax(format!("invalid YAML: {}", e)))?;
        let raw: RawDescriptor =
            serde_yaml::from_value(value).map_err(|e| StaveError::Schema(e.to_string()))?;
        canonicalize(raw)
    }

    /// Decode a JSON descriptor.
    pub fn from_json(text: &str) -> Result<Descriptor> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| StaveError::Syntax(format!("invalid JSON: {}", e)))?;
        Descriptor::from_input(value)
    }

    /// Decode an already-structured document, e.g. one delivered over the
    /// wire instead of read from a file. Same normalization path as the
    /// textual decoders.
    pub fn from_input(value: serde_json::Value) -> Result<Descriptor> {
        let raw: RawDescriptor =
            serde_json::from_value(value).map_err(|e| StaveError::Schema(e.to_string()))?;
        canonicalize(raw)
    }

    /// Decode source text in the given format.
    pub fn from_source(text: &str, format: SourceFormat) -> Result<Descriptor> {
        match format {
            SourceFormat::Yaml => Descriptor::from_yaml(text),
            SourceFormat::Json => Descriptor::from_json(text),
        }
    }

    /// Canonical YAML rendering. Derived state (graph, dependency
    /// back-references, status flags) is not serialized.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&RawDescriptor::from_canonical(self))
            .map_err(|e| StaveError::Internal(format!("descriptor YAML encoding failed: {}", e)))
    }

    /// Canonical JSON rendering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&RawDescriptor::from_canonical(self))
            .map_err(|e| StaveError::Internal(format!("descriptor JSON encoding failed: {}", e)))
    }
}

fn canonicalize(raw: RawDescriptor) -> Result<Descriptor> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut applications = Vec::with_capacity(raw.applications.len());
    for raw_app in raw.applications {
        let app = canonicalize_application(raw_app)?;
        if !seen.insert(app.name.clone()) {
            return Err(StaveError::Semantic(format!(
                "duplicate application name '{}'",
                app.name
            )));
        }
        applications.push(app);
    }

    Ok(Descriptor {
        catalog: raw.catalog.unwrap_or_default(),
        applications,
        answers: raw.answers.unwrap_or_default().normalized(),
        graph: AppGraph::default(),
    })
}

fn canonicalize_application(raw: RawApplication) -> Result<Application> {
    if raw.name.is_empty() {
        return Err(StaveError::Semantic(
            "application name must not be empty".to_string(),
        ));
    }
    if raw.image.is_empty() {
        return Err(StaveError::Semantic(format!(
            "application '{}' has no image",
            raw.name
        )));
    }
    let name = raw.name;

    let volumes = raw
        .volumes
        .unwrap_or_default()
        .iter()
        .map(|entry| Volume::parse(entry))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| in_field(e, &name, "volumes"))?;
    let ports = raw
        .ports
        .unwrap_or_default()
        .iter()
        .map(|entry| Port::parse(entry))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| in_field(e, &name, "ports"))?;
    let links = raw
        .links
        .unwrap_or_default()
        .iter()
        .map(|entry| Link::parse(entry))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| in_field(e, &name, "links"))?;
    let expose = raw
        .expose
        .unwrap_or_default()
        .into_iter()
        .map(decode_expose)
        .collect::<Result<Vec<_>>>()
        .map_err(|e| in_field(e, &name, "expose"))?;

    // network_mode wins over net when both carry a value
    let mut net = match (raw.network_mode, raw.net) {
        (Some(mode), _) if !mode.is_empty() => mode,
        (_, Some(net)) => net,
        _ => String::new(),
    };
    if net.is_empty() {
        net = "bridge".to_string();
    }

    Ok(Application {
        name,
        image: raw.image,
        entrypoint: raw.entrypoint.unwrap_or_default(),
        command: raw.command,
        environment: raw
            .environment
            .map(|kv| kv.into_pairs())
            .unwrap_or_default(),
        labels: raw.labels.map(|kv| kv.into_pairs()).unwrap_or_default(),
        volumes,
        ports,
        links,
        expose,
        net,
        restart: raw.restart.unwrap_or_default(),
        orchestrator_config: raw.orchestrator_config.unwrap_or_default(),
        has_dependents: false,
        meets_criteria: false,
        dependencies: Vec::new(),
    })
}

fn decode_expose(entry: RawExpose) -> Result<u32> {
    match entry {
        RawExpose::Number(n) => u32::try_from(n).map_err(|_| {
            StaveError::Semantic(format!("expose entry '{}' is not a non-negative integer", n))
        }),
        RawExpose::Text(s) => s.parse::<u32>().map_err(|_| {
            StaveError::Semantic(format!("expose entry '{}' is not a non-negative integer", s))
        }),
    }
}

fn in_field(err: StaveError, app: &str, field: &str) -> StaveError {
    match err {
        StaveError::Schema(msg) => {
            StaveError::Schema(format!("application '{}' {}: {}", app, field, msg))
        }
        StaveError::Semantic(msg) => {
            StaveError::Semantic(format!("application '{}' {}: {}", app, field, msg))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::model::{Command, KeyValue, QuestionKind};
    use serde_json::json;

    const FULL_DESCRIPTOR: &str = r#"
catalog:
  name: wordstack
  version: "1.0"
  uuid: cat-001
  questions:
    - variable: cluster_id
      label: Cluster
      type: int
      required: true
    - variable: flavor
      type: enum
      default: small
      options: [small, large]
applications:
  - name: web
    image: nginx:1.27
    ports: ["80", "8080:80", "10.0.0.1:8080:80", "53:53/udp"]
    links: ["db:database"]
    environment:
      ZETA: z
      ALPHA: a
  - name: db
    image: postgres:16
    volumes: ["/data:/var/lib/postgresql/data:ro"]
    expose: [5432, "5433"]
    environment: ["PGDATA=/var/lib/postgresql/data", "DEBUG"]
answers:
  Cluster_Id: "7"
"#;

    #[test]
    fn test_port_shorthand_canonicalization() {
        let descriptor = Descriptor::from_yaml(FULL_DESCRIPTOR).unwrap();
        let ports = &descriptor.application("web").unwrap().ports;
        assert_eq!(ports.len(), 4);
        assert_eq!((ports[0].host_port.as_str(), ports[0].container_port.as_str()), ("80", "80"));
        assert_eq!((ports[1].host_port.as_str(), ports[1].container_port.as_str()), ("8080", "80"));
        assert_eq!(ports[2].host_addr, "10.0.0.1");
        assert_eq!(ports[2].host_port, "8080");
        assert_eq!(ports[2].container_port, "80");
        assert_eq!(ports[3].protocol, "udp");
        assert_eq!(ports[3].host_port, "53");
    }

    #[test]
    fn test_catalog_questions_decoded() {
        let descriptor = Descriptor::from_yaml(FULL_DESCRIPTOR).unwrap();
        let questions = &descriptor.catalog.questions;
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].variable, "cluster_id");
        assert_eq!(questions[0].kind, QuestionKind::Int);
        assert!(questions[0].required);
        assert_eq!(questions[1].kind, QuestionKind::Enum);
        assert_eq!(questions[1].options, vec!["small", "large"]);
    }

    #[test]
    fn test_environment_map_sorted_list_preserved() {
        let descriptor = Descriptor::from_yaml(FULL_DESCRIPTOR).unwrap();
        let web = descriptor.application("web").unwrap();
        assert_eq!(web.environment[0], KeyValue::new("ALPHA", "a"));
        assert_eq!(web.environment[1], KeyValue::new("ZETA", "z"));

        let db = descriptor.application("db").unwrap();
        assert_eq!(
            db.environment[0],
            KeyValue::new("PGDATA", "/var/lib/postgresql/data")
        );
        assert_eq!(db.environment[1], KeyValue::new("DEBUG", ""));
    }

    #[test]
    fn test_inline_answers_normalized() {
        let descriptor = Descriptor::from_yaml(FULL_DESCRIPTOR).unwrap();
        assert_eq!(descriptor.answers.get("cluster_id"), Some("7"));
        assert_eq!(descriptor.answers.get("clusterid"), Some("7"));
    }

    #[test]
    fn test_expose_accepts_numbers_and_strings() {
        let descriptor = Descriptor::from_yaml(FULL_DESCRIPTOR).unwrap();
        assert_eq!(descriptor.application("db").unwrap().expose, vec![5432, 5433]);
    }

    #[test]
    fn test_expose_negative_is_semantic() {
        let err = Descriptor::from_yaml(
            "applications:\n  - name: a\n    image: i\n    expose: [-1]\n",
        )
        .unwrap_err();
        assert!(matches!(err, StaveError::Semantic(_)), "{}", err);
        assert!(err.to_string().contains("application 'a' expose"));
    }

    #[test]
    fn test_command_scalar_and_list_forms() {
        let descriptor = Descriptor::from_yaml(
            "applications:\n  - name: a\n    image: i\n    command: run -d\n  - name: b\n    image: i\n    command: [run, -d]\n",
        )
        .unwrap();
        assert_eq!(
            descriptor.application("a").unwrap().command,
            Some(Command::Single("run -d".into()))
        );
        assert_eq!(
            descriptor.application("b").unwrap().command,
            Some(Command::Many(vec!["run".into(), "-d".into()]))
        );
    }

    #[test]
    fn test_net_defaults_to_bridge() {
        let descriptor =
            Descriptor::from_yaml("applications:\n  - name: a\n    image: i\n").unwrap();
        assert_eq!(descriptor.application("a").unwrap().net, "bridge");
    }

    #[test]
    fn test_network_mode_wins_over_net() {
        let descriptor = Descriptor::from_yaml(
            "applications:\n  - name: a\n    image: i\n    net: bridge\n    network_mode: host\n",
        )
        .unwrap();
        assert_eq!(descriptor.application("a").unwrap().net, "host");
    }

    #[test]
    fn test_unknown_top_level_key_is_schema_error() {
        let err = Descriptor::from_yaml("applications: []\nvolumes_from: []\n").unwrap_err();
        assert!(matches!(err, StaveError::Schema(_)), "{}", err);
    }

    #[test]
    fn test_unknown_application_key_tolerated() {
        let descriptor = Descriptor::from_yaml(
            "applications:\n  - name: a\n    image: i\n    cpuset: \"0-3\"\n",
        )
        .unwrap();
        assert_eq!(descriptor.applications.len(), 1);
    }

    #[test]
    fn test_malformed_yaml_is_syntax_error() {
        let err = Descriptor::from_yaml("applications: [\n").unwrap_err();
        assert!(matches!(err, StaveError::Syntax(_)), "{}", err);
    }

    #[test]
    fn test_malformed_json_is_syntax_error() {
        let err = Descriptor::from_json("{\"applications\": ").unwrap_err();
        assert!(matches!(err, StaveError::Syntax(_)), "{}", err);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Descriptor::from_yaml(
            "applications:\n  - name: a\n    image: i\n  - name: a\n    image: j\n",
        )
        .unwrap_err();
        assert!(matches!(err, StaveError::Semantic(_)));
        assert!(err.to_string().contains("duplicate application name 'a'"));
    }

    #[test]
    fn test_missing_image_rejected() {
        let err = Descriptor::from_yaml("applications:\n  - name: a\n").unwrap_err();
        assert!(matches!(err, StaveError::Semantic(_)));
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn test_port_error_names_application_and_field() {
        let err = Descriptor::from_yaml(
            "applications:\n  - name: a\n    image: i\n    ports: [\"http:80\"]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("application 'a' ports"), "{}", err);
    }

    #[test]
    fn test_from_json_matches_from_yaml() {
        let yaml = Descriptor::from_yaml(
            "applications:\n  - name: a\n    image: i\n    ports: [\"8080:80\"]\n",
        )
        .unwrap();
        let json = Descriptor::from_json(
            r#"{"applications": [{"name": "a", "image": "i", "ports": ["8080:80"]}]}"#,
        )
        .unwrap();
        assert_eq!(yaml, json);
    }

    #[test]
    fn test_from_input_structured_record() {
        let descriptor = Descriptor::from_input(json!({
            "applications": [
                {"name": "a", "image": "i", "environment": {"K": "v"}}
            ]
        }))
        .unwrap();
        assert_eq!(
            descriptor.application("a").unwrap().environment,
            vec![KeyValue::new("K", "v")]
        );
    }

    #[test]
    fn test_round_trip_is_identity() {
        let first = Descriptor::from_yaml(FULL_DESCRIPTOR).unwrap();
        let encoded = first.to_yaml().unwrap();
        let second = Descriptor::from_yaml(&encoded).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.to_yaml().unwrap(), encoded);
    }

    #[test]
    fn test_json_round_trip_is_identity() {
        let first = Descriptor::from_yaml(FULL_DESCRIPTOR).unwrap();
        let second = Descriptor::from_json(&first.to_json().unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let a = Descriptor::from_yaml(FULL_DESCRIPTOR).unwrap();
        let b = Descriptor::from_yaml(FULL_DESCRIPTOR).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_yaml().unwrap(), b.to_yaml().unwrap());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            SourceFormat::from_path(Path::new("stack.json")),
            SourceFormat::Json
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("stack.yaml")),
            SourceFormat::Yaml
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("stack")),
            SourceFormat::Yaml
        );
    }
}
