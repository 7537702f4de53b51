//! HTTP channel variant
//!
//! Talks to an orchestrator's JSON API. Transient failures (network errors
//! and 5xx) are retried with jittered exponential backoff; 4xx responses
//! fail immediately.

use crate::channel::{AppState, AuthConfig, Channel, ChannelConfig};
use crate::descriptor::model::Application;
use crate::descriptor::raw::RawApplication;
use crate::error::{Result, StaveError};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TOKEN_HEADER: &str = "x-auth-token";
const MAX_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// HTTP orchestrator client. Stateless across calls; safe to share between
/// concurrent command tasks.
#[derive(Debug)]
pub struct HttpChannel {
    base_url: String,
    auth: AuthConfig,
    client: reqwest::Client,
}

impl HttpChannel {
    pub fn new(config: ChannelConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(config.insecure);
        if config.insecure {
            tracing::warn!("channel skips TLS verification");
        }

        if let AuthConfig::Pk {
            ref cert_path,
            ref key_path,
        } = config.auth
        {
            let cert = std::fs::read(cert_path).map_err(|e| {
                StaveError::Config(format!(
                    "reading client certificate {}: {}",
                    cert_path.display(),
                    e
                ))
            })?;
            let key = std::fs::read(key_path).map_err(|e| {
                StaveError::Config(format!(
                    "reading client key {}: {}",
                    key_path.display(),
                    e
                ))
            })?;
            let identity = reqwest::Identity::from_pkcs8_pem(&cert, &key)
                .map_err(|e| StaveError::Config(format!("client certificate rejected: {}", e)))?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| StaveError::Config(e.to_string()))?;

        Ok(HttpChannel {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth: config.auth,
            client,
        })
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            AuthConfig::Token { token, header } => {
                request.header(header.as_deref().unwrap_or(DEFAULT_TOKEN_HEADER), token)
            }
            AuthConfig::HttpBasic {
                principal,
                password,
            } => request.basic_auth(principal, Some(password)),
            // client certificates ride on the transport
            AuthConfig::Pk { .. } => request,
        }
    }

    /// Send one request, classifying the outcome by status class.
    async fn dispatch(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let request = self
            .apply_auth(request)
            .header("x-request-id", Uuid::new_v4().to_string());

        let response = request.send().await.map_err(|e| StaveError::Transient {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(StaveError::Client {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
                message,
            })
        } else {
            Err(StaveError::Transient {
                endpoint: endpoint.to_string(),
                message: format!("HTTP {}: {}", status.as_u16(), message),
            })
        }
    }

    /// Retry transient failures with exponential backoff starting at 100 ms,
    /// doubling per attempt with ±20% jitter, up to 5 attempts total.
    async fn send_with_retry<F>(&self, endpoint: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut backoff = INITIAL_BACKOFF;
        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let wait = jitter(backoff);
                tracing::warn!(
                    endpoint,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "transient channel failure, retrying"
                );
                tokio::time::sleep(wait).await;
                backoff *= 2;
            }

            match self.dispatch(endpoint, build()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            StaveError::Internal(format!("retry loop for {} produced no error", endpoint))
        }))
    }

    fn app_url(&self, app: &Application, action: &str) -> String {
        format!("{}/v1/applications/{}/{}", self.base_url, app.name, action)
    }

    fn app_body(app: &Application) -> Result<serde_json::Value> {
        serde_json::to_value(RawApplication::from_canonical(app))
            .map_err(|e| StaveError::Internal(format!("application encoding failed: {}", e)))
    }
}

#[async_trait]
impl Channel for HttpChannel {
    fn name(&self) -> &str {
        "http"
    }

    async fn create(&self, app: &Application) -> Result<()> {
        let url = format!("{}/v1/applications", self.base_url);
        let body = Self::app_body(app)?;
        self.send_with_retry(&url, || self.client.post(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn run(&self, app: &Application) -> Result<()> {
        let url = self.app_url(app, "run");
        let body = Self::app_body(app)?;
        self.send_with_retry(&url, || self.client.post(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn stop(&self, app: &Application) -> Result<()> {
        let url = self.app_url(app, "stop");
        let body = Self::app_body(app)?;
        self.send_with_retry(&url, || self.client.post(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn restart(&self, app: &Application) -> Result<()> {
        let url = self.app_url(app, "restart");
        let body = Self::app_body(app)?;
        self.send_with_retry(&url, || self.client.post(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn scale(&self, app: &Application, instances: i32) -> Result<()> {
        let url = self.app_url(app, "scale");
        let body = serde_json::json!({ "instances": instances });
        self.send_with_retry(&url, || self.client.post(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn status(&self, app: &Application) -> Result<AppState> {
        let url = self.app_url(app, "status");
        let response = self
            .send_with_retry(&url, || self.client.get(&url))
            .await?;
        // decoded outside the retry loop; must not classify as transient
        let status = response.status();
        response.json().await.map_err(|e| StaveError::Client {
            status: status.as_u16(),
            endpoint: url,
            message: format!("malformed status body: {}", e),
        })
    }
}

fn jitter(base: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.8..=1.2);
    base.mul_f64(factor)
}
