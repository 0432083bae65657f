use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;

use crate::error::UpdateError;
use crate::model::Session;

use super::SessionSource;

/// HTTP client for the RetroWFC group list.
///
/// Endpoint and identifying header are fixed: the upstream serves one
/// public document and expects this exact `User-Agent`.
pub struct RwfcClient {
    http: reqwest::Client,
}

impl RwfcClient {
    pub const API_URL: &'static str = "http://rwfc.net/api/groups";
    pub const API_USER_AGENT: &'static str = "HomeAssistant/69.420";
    const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self { http })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpdateError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_else(|_| String::new());

        Err(UpdateError::Status { status, body })
    }

    /// Fetch and decode the current group list.
    ///
    /// An empty or `null` body is a valid "no sessions" answer, not an
    /// error; everything else must decode as a session array.
    pub async fn fetch_groups(&self) -> Result<Vec<Session>, UpdateError> {
        let response = self
            .http
            .get(Self::API_URL)
            .header(USER_AGENT, Self::API_USER_AGENT)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let body = response.text().await?;

        Ok(decode_groups(&body)?)
    }
}

#[async_trait]
impl SessionSource for RwfcClient {
    async fn fetch_sessions(&self) -> Result<Vec<Session>, UpdateError> {
        self.fetch_groups().await
    }
}

fn decode_groups(body: &str) -> Result<Vec<Session>, serde_json::Error> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    // the upstream serves a bare `null` when no groups are open
    let sessions: Option<Vec<Session>> = serde_json::from_str(body)?;
    Ok(sessions.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_empty_body_as_no_sessions() {
        assert_eq!(decode_groups("").unwrap(), Vec::new());
        assert_eq!(decode_groups("  \n").unwrap(), Vec::new());
    }

    #[test]
    fn decode_null_body_as_no_sessions() {
        assert_eq!(decode_groups("null").unwrap(), Vec::new());
    }

    #[test]
    fn decode_empty_array() {
        assert_eq!(decode_groups("[]").unwrap(), Vec::new());
    }

    #[test]
    fn decode_session_array() {
        let body = r#"[{"rk":"vs_10","suspend":0,"players":{"1":{"fc":"1234","ev":5000}}}]"#;

        let sessions = decode_groups(body).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].rk, "vs_10");
        assert_eq!(sessions[0].players["1"].fc, "1234");
        assert_eq!(sessions[0].players["1"].ev, Some(5000));
    }

    #[test]
    fn decode_rejects_non_array_payloads() {
        assert!(decode_groups("{\"rk\":\"vs_10\"}").is_err());
        assert!(decode_groups("not json").is_err());
    }
}
