//! Orchestrator parameter assignment

use crate::descriptor::model::Descriptor;
use crate::error::Result;
use crate::pipeline::Processor;

/// Copies cluster id, app name and image version from the answer set onto
/// every application's orchestrator config. Answers that are absent leave
/// the existing value alone.
pub struct OrchestratorParams;

impl Processor for OrchestratorParams {
    fn name(&self) -> &'static str {
        "orchestrator-params"
    }

    fn process(&self, descriptor: &mut Descriptor) -> Result<()> {
        let answers = descriptor.answers.clone();
        for app in &mut descriptor.applications {
            let config = &mut app.orchestrator_config;
            if let Some(value) = answers.get("cluster_id") {
                config.cluster_id = parse_cluster_id(value);
            }
            if let Some(value) = answers.get("app_name") {
                config.app_name = value.to_string();
            }
            if let Some(value) = answers.get("image_version") {
                config.image_version = value.to_string();
            }
        }
        Ok(())
    }
}

/// Cluster-id assignment kept as its own step for descriptors that predate
/// [`OrchestratorParams`]. Only fills the field when nothing has set it, so
/// the parameter processor stays the source of truth on conflict.
pub struct ClusterId;

impl Processor for ClusterId {
    fn name(&self) -> &'static str {
        "cluster-id"
    }

    fn process(&self, descriptor: &mut Descriptor) -> Result<()> {
        let answers = descriptor.answers.clone();
        for app in &mut descriptor.applications {
            if app.orchestrator_config.cluster_id != 0 {
                continue;
            }
            if let Some(value) = answers.get("cluster_id") {
                app.orchestrator_config.cluster_id = parse_cluster_id(value);
            }
        }
        Ok(())
    }
}

fn parse_cluster_id(value: &str) -> i32 {
    match value.parse::<i32>() {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!(value, "cluster_id answer is not an integer, using 0");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::model::{Application, OrchestratorConfig};

    fn two_app_descriptor() -> Descriptor {
        Descriptor {
            applications: vec![
                Application {
                    name: "web".to_string(),
                    image: "web:1".to_string(),
                    ..Application::default()
                },
                Application {
                    name: "db".to_string(),
                    image: "db:1".to_string(),
                    ..Application::default()
                },
            ],
            ..Descriptor::default()
        }
    }

    #[test]
    fn test_params_copied_to_every_application() {
        let mut descriptor = two_app_descriptor();
        descriptor.answers.insert("cluster_id", "7");
        descriptor.answers.insert("app_name", "shop");
        descriptor.answers.insert("image_version", "2.4");

        OrchestratorParams.process(&mut descriptor).unwrap();

        for app in &descriptor.applications {
            assert_eq!(app.orchestrator_config.cluster_id, 7);
            assert_eq!(app.orchestrator_config.app_name, "shop");
            assert_eq!(app.orchestrator_config.image_version, "2.4");
        }
    }

    #[test]
    fn test_case_insensitive_answer_keys() {
        let mut descriptor = two_app_descriptor();
        descriptor.answers.insert("ClusterId", "3");
        descriptor.answers.insert("APPNAME", "shop");
        descriptor.answers.insert("ImageVersion", "0.9");

        OrchestratorParams.process(&mut descriptor).unwrap();

        let config = &descriptor.applications[0].orchestrator_config;
        assert_eq!(config.cluster_id, 3);
        assert_eq!(config.app_name, "shop");
        assert_eq!(config.image_version, "0.9");
    }

    #[test]
    fn test_malformed_cluster_id_becomes_zero() {
        let mut descriptor = two_app_descriptor();
        descriptor.answers.insert("cluster_id", "not-a-number");

        OrchestratorParams.process(&mut descriptor).unwrap();
        assert_eq!(descriptor.applications[0].orchestrator_config.cluster_id, 0);
    }

    #[test]
    fn test_absent_answers_leave_config_alone() {
        let mut descriptor = two_app_descriptor();
        descriptor.applications[0].orchestrator_config = OrchestratorConfig {
            cluster_id: 9,
            app_name: "keep".to_string(),
            ..OrchestratorConfig::default()
        };

        OrchestratorParams.process(&mut descriptor).unwrap();

        let config = &descriptor.applications[0].orchestrator_config;
        assert_eq!(config.cluster_id, 9);
        assert_eq!(config.app_name, "keep");
    }

    #[test]
    fn test_answer_overrides_descriptor_supplied_value() {
        let mut descriptor = two_app_descriptor();
        descriptor.applications[0].orchestrator_config.cluster_id = 9;
        descriptor.answers.insert("cluster_id", "4");

        OrchestratorParams.process(&mut descriptor).unwrap();
        assert_eq!(descriptor.applications[0].orchestrator_config.cluster_id, 4);
    }

    #[test]
    fn test_cluster_id_step_fills_only_unset() {
        let mut descriptor = two_app_descriptor();
        descriptor.applications[0].orchestrator_config.cluster_id = 9;
        descriptor.answers.insert("cluster_id", "4");

        ClusterId.process(&mut descriptor).unwrap();

        assert_eq!(descriptor.applications[0].orchestrator_config.cluster_id, 9);
        assert_eq!(descriptor.applications[1].orchestrator_config.cluster_id, 4);
    }
}
