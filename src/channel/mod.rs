//! Channel layer
//!
//! A channel executes lifecycle verbs against a concrete orchestrator. The
//! engine holds one behind a trait object so command traversal stays
//! independent of any wire protocol. A symmetric input channel for
//! asynchronous status ingestion is anticipated but not modeled yet.

pub mod http;

pub use http::HttpChannel;

use crate::descriptor::model::Application;
use crate::error::{Result, StaveError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Observed state of one application, as reported by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    /// Orchestrator-side state string
    pub state: String,
    /// Whether the application currently satisfies its health criteria
    #[serde(default)]
    pub meets_criteria: bool,
}

/// Back-end adapter for lifecycle verbs. Implementations must be safe to
/// call concurrently for different applications and hold no per-call
/// mutable state.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel variant name, for logs.
    fn name(&self) -> &str;

    /// Define the application on the orchestrator.
    async fn create(&self, app: &Application) -> Result<()>;

    /// Start a defined application.
    async fn run(&self, app: &Application) -> Result<()>;

    /// Stop a running application.
    async fn stop(&self, app: &Application) -> Result<()>;

    /// Restart a single application in place.
    async fn restart(&self, app: &Application) -> Result<()>;

    /// Change the instance count of a running application.
    async fn scale(&self, app: &Application, instances: i32) -> Result<()>;

    /// Query the current state of an application.
    async fn status(&self, app: &Application) -> Result<AppState>;
}

/// Channels shared across command tasks.
pub type SharedChannel = Arc<dyn Channel>;

/// Authentication mode of the HTTP channel. The `mode` tag matches the
/// serialized config file; everything else about the variant is typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Fixed token carried in a configurable request header.
    Token {
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        header: Option<String>,
    },
    /// Standard Basic auth.
    HttpBasic { principal: String, password: String },
    /// Mutual TLS with a client certificate; requests carry no auth header.
    Pk {
        cert_path: PathBuf,
        key_path: PathBuf,
    },
}

/// Channel configuration, loaded out-of-band from the descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel variant discriminator
    #[serde(rename = "type", default = "default_channel_type")]
    pub channel_type: String,
    /// Orchestrator API base URL
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Skip TLS verification; for clusters on self-signed certificates
    #[serde(default)]
    pub insecure: bool,
    /// Authentication mode
    pub auth: AuthConfig,
}

fn default_channel_type() -> String {
    "http".to_string()
}

impl ChannelConfig {
    /// Load a channel configuration from a YAML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&text).map_err(|e| {
            StaveError::Config(format!("channel config {}: {}", path.display(), e))
        })
    }

    /// Construct the channel variant this configuration names.
    pub fn build(self) -> Result<SharedChannel> {
        match self.channel_type.as_str() {
            "http" => Ok(Arc::new(HttpChannel::new(self)?)),
            other => Err(StaveError::Config(format!(
                "unknown channel type '{}'",
                other
            ))),
        }
    }
}
