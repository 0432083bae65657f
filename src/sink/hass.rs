use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use url::Url;

use crate::config::HassServer;
use crate::error::{BridgeError, BridgeResult};

use super::{SensorBatch, SensorReport, StateSink};

/// Pushes sensor states into a Home Assistant instance over its REST API.
///
/// Each report becomes one `POST /api/states/sensor.{object_id}` with a
/// bearer token. The token is read from the environment once, at
/// construction.
pub struct HassSink {
    name: String,
    base_url: Url,
    http: reqwest::Client,
    token: String,
}

impl HassSink {
    const DEFAULT_TOKEN_ENV: &'static str = "HASS_TOKEN";
    const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn new(name: &str, server: &HassServer) -> BridgeResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS))
            .build()?;
        let token = Self::load_token_from_env(name, server)?;

        Ok(Self {
            name: name.to_string(),
            base_url: server.url.clone(),
            http,
            token,
        })
    }

    fn load_token_from_env(name: &str, server: &HassServer) -> BridgeResult<String> {
        let token_env = server
            .token_env
            .as_deref()
            .unwrap_or(Self::DEFAULT_TOKEN_ENV);
        let token = std::env::var(token_env).map_err(|_| {
            BridgeError::service_error(format!(
                "[{name}] Missing Home Assistant token env var {token_env}"
            ))
        })?;
        if token.trim().is_empty() {
            return Err(BridgeError::service_error(format!(
                "[{name}] Empty Home Assistant token in env var {token_env}"
            )));
        }
        Ok(token)
    }

    fn endpoint_url(&self, endpoint: &str) -> BridgeResult<Url> {
        let base = if self.base_url.path().is_empty() {
            format!("{}/", self.base_url)
        } else {
            self.base_url.to_string()
        };
        let base = Url::parse(&base)?;
        Ok(base.join(endpoint.trim_start_matches('/'))?)
    }

    async fn check_status(
        &self,
        response: reqwest::Response,
        action: &str,
    ) -> BridgeResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_else(|_| String::new());

        let details = if body.is_empty() {
            format!("{status}")
        } else {
            format!("{status}: {body}")
        };

        let err = if status == StatusCode::UNAUTHORIZED {
            format!(
                "[{}] Home Assistant unauthorized during {}. Verify the configured token",
                self.name, action
            )
        } else {
            format!(
                "[{}] Home Assistant error during {}: {}",
                self.name, action, details
            )
        };

        Err(BridgeError::service_error(err))
    }

    async fn set_state(&self, report: &SensorReport) -> BridgeResult<()> {
        let action = format!("POST /api/states/sensor.{}", report.object_id);
        let url = self.endpoint_url(&format!("/api/states/sensor.{}", report.object_id))?;

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&state_payload(report))
            .send()
            .await?;
        let _response = self.check_status(response, &action).await?;

        Ok(())
    }
}

#[async_trait]
impl StateSink for HassSink {
    async fn push(&self, batch: &SensorBatch) -> BridgeResult<()> {
        // every report is attempted; the first failure is returned once
        // the whole batch went out
        let mut pushed = 0_usize;
        let mut first_failure = None;
        for report in &batch.reports {
            match self.set_state(report).await {
                Ok(()) => pushed += 1,
                Err(err) if first_failure.is_none() => first_failure = Some(err),
                Err(err) => log::warn!("[{}] State push failed: {err}", batch.entry),
            }
        }
        log::debug!(
            "[{}] Pushed {pushed}/{} sensor states for [{}]",
            self.name,
            batch.reports.len(),
            batch.entry
        );
        first_failure.map_or(Ok(()), Err)
    }
}

fn state_payload(report: &SensorReport) -> Value {
    json!({
        "state": report.state_str(),
        "attributes": report.state.attributes,
    })
}
