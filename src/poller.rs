//! RAPT cloud poller
//!
//! Pulls hydrometer telemetry from the RAPT cloud API and forwards the newest
//! sample to the monitor's ingest endpoint. One `sync_once` call is one
//! cycle: token, telemetry, post. `list_devices` finds the hydrometer ids
//! an account can poll.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tracing::{debug, info};

use crate::config::defaults::{RAPT_API_URL, RAPT_AUTH_URL};
use crate::types::DeviceReading;

/// Client id RAPT issues to end-user password-grant logins.
const RAPT_CLIENT_ID: &str = "rapt-user";

#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("RAPT authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },
    #[error("RAPT API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("backend rejected reading ({status}): {body}")]
    Backend { status: u16, body: String },
}

/// One telemetry point as returned by `GetTelemetry`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    pub created_on: DateTime<Utc>,
    pub gravity: f64,
    pub temperature: f64,
    #[serde(default)]
    pub battery: f64,
}

impl Telemetry {
    /// RAPT reports gravity in points (1048.2) on some firmware; normalize to SG.
    pub fn gravity_sg(&self) -> f64 {
        if self.gravity > 100.0 {
            self.gravity / 1000.0
        } else {
            self.gravity
        }
    }

    pub fn into_device_reading(self, device_id: &str) -> DeviceReading {
        DeviceReading {
            timestamp: self.created_on,
            gravity: self.gravity_sg(),
            temperature: self.temperature,
            battery: self.battery.clamp(0.0, 100.0).round(),
            device_id: Some(device_id.to_string()),
        }
    }
}

/// A hydrometer registered to the account, from `GetHydrometers`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hydrometer {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "macAddress")]
    pub mac: Option<String>,
    #[serde(default)]
    pub is_online: bool,
}

impl Hydrometer {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("(unnamed)")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct RaptClient {
    http: reqwest::Client,
    auth_url: String,
    api_url: String,
    username: String,
    api_secret: String,
}

impl RaptClient {
    pub fn new(username: impl Into<String>, api_secret: impl Into<String>, timeout: StdDuration) -> Result<Self, PollerError> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            auth_url: RAPT_AUTH_URL.to_string(),
            api_url: RAPT_API_URL.to_string(),
            username: username.into(),
            api_secret: api_secret.into(),
        })
    }

    /// Point at different identity / API hosts.
    pub fn with_endpoints(mut self, auth_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// OAuth password grant against the RAPT identity server.
    pub async fn token(&self) -> Result<String, PollerError> {
        let response = self
            .http
            .post(&self.auth_url)
            .form(&[
                ("client_id", RAPT_CLIENT_ID),
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.api_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollerError::Auth {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json::<TokenResponse>().await?.access_token)
    }

    /// Every hydrometer on the account.
    pub async fn hydrometers(&self, token: &str) -> Result<Vec<Hydrometer>, PollerError> {
        let response = self
            .http
            .get(format!("{}/api/Hydrometers/GetHydrometers", self.api_url))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(check_api(response).await?.json().await?)
    }

    /// Telemetry of one hydrometer between `start` and `end`, oldest first.
    pub async fn telemetry(
        &self,
        token: &str,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Telemetry>, PollerError> {
        let response = self
            .http
            .get(format!("{}/api/Hydrometers/GetTelemetry", self.api_url))
            .bearer_auth(token)
            .query(&[
                ("hydrometerId", device_id.to_string()),
                ("startDate", start.to_rfc3339()),
                ("endDate", end.to_rfc3339()),
            ])
            .send()
            .await?;

        let mut points: Vec<Telemetry> = check_api(response).await?.json().await?;
        points.sort_by_key(|p| p.created_on);
        Ok(points)
    }
}

async fn check_api(response: reqwest::Response) -> Result<reqwest::Response, PollerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(PollerError::Api {
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    })
}

/// Log in and list the account's hydrometers.
pub async fn list_devices(rapt: &RaptClient) -> Result<Vec<Hydrometer>, PollerError> {
    let token = rapt.token().await?;
    let devices = rapt.hydrometers(&token).await?;
    info!(count = devices.len(), "📡 Hydrometers found");
    Ok(devices)
}

/// Client for the monitor's own ingest endpoint.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// `base_url` is the server root, e.g. `http://localhost:8000`.
    pub fn new(base_url: impl Into<String>, timeout: StdDuration) -> Result<Self, PollerError> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn ingest_url(&self) -> String {
        format!("{}/api/v1/readings/ingest", self.base_url)
    }

    pub async fn ingest(&self, reading: &DeviceReading) -> Result<serde_json::Value, PollerError> {
        let response = self.http.post(self.ingest_url()).json(reading).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PollerError::Backend {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Newest sample forwarded; the number of alerts it produced
    Forwarded { reading: DeviceReading, alerts: usize },
    /// The device reported nothing in the lookback window
    NoTelemetry,
}

/// Fetch the trailing `lookback` of telemetry and forward the newest sample.
pub async fn sync_once(
    rapt: &RaptClient,
    backend: &BackendClient,
    device_id: &str,
    lookback: Duration,
) -> Result<SyncOutcome, PollerError> {
    let token = rapt.token().await?;
    debug!("RAPT token obtained");

    let end = Utc::now();
    let points = rapt.telemetry(&token, device_id, end - lookback, end).await?;
    info!(count = points.len(), "📡 Telemetry fetched");

    let Some(latest) = points.into_iter().last() else {
        return Ok(SyncOutcome::NoTelemetry);
    };
    let reading = latest.into_device_reading(device_id);
    let response = backend.ingest(&reading).await?;
    let alerts = response["data"]["alerts"].as_array().map_or(0, Vec::len);

    info!(
        gravity = reading.gravity,
        temperature = reading.temperature,
        alerts,
        "✅ Reading forwarded"
    );
    Ok(SyncOutcome::Forwarded { reading, alerts })
}
