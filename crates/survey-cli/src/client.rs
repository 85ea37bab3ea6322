//! HTTP client for the survey server REST API.

use anyhow::{bail, Context, Result};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use survey_core::{FlightPattern, MissionDescriptor};

/// Thin wrapper over the `/v1` command endpoints.
pub struct SurveyClient {
    client: Client,
    base_url: String,
}

impl SurveyClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the server (e.g., "http://localhost:3000")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn simulation_url(&self, mission_id: &str, action: &str) -> String {
        self.url(&format!("/v1/simulations/{mission_id}/{action}"))
    }

    pub async fn register_mission(&self, descriptor: &MissionDescriptor) -> Result<Value> {
        let response = self
            .client
            .post(self.url("/v1/missions"))
            .json(descriptor)
            .send()
            .await
            .context("Failed to register mission")?;
        read_json(response).await
    }

    pub async fn start(&self, mission_id: &str, pattern: Option<FlightPattern>) -> Result<Value> {
        let body = match pattern {
            Some(p) => json!({ "pattern": p.as_str() }),
            None => json!({}),
        };
        self.post(self.simulation_url(mission_id, "start"), body).await
    }

    pub async fn pause(&self, mission_id: &str) -> Result<Value> {
        self.post(self.simulation_url(mission_id, "pause"), json!({})).await
    }

    pub async fn resume(&self, mission_id: &str) -> Result<Value> {
        self.post(self.simulation_url(mission_id, "resume"), json!({})).await
    }

    pub async fn stop(&self, mission_id: &str) -> Result<Value> {
        self.post(self.simulation_url(mission_id, "stop"), json!({})).await
    }

    pub async fn set_speed(&self, mission_id: &str, speed_mps: f64) -> Result<Value> {
        self.post(
            self.simulation_url(mission_id, "speed"),
            json!({ "speed_mps": speed_mps }),
        )
        .await
    }

    pub async fn trigger_rth(&self, mission_id: &str) -> Result<Value> {
        self.post(self.simulation_url(mission_id, "rth"), json!({})).await
    }

    pub async fn snapshot(&self, mission_id: &str) -> Result<Value> {
        self.get(self.url(&format!("/v1/simulations/{mission_id}"))).await
    }

    pub async fn list(&self) -> Result<Value> {
        self.get(self.url("/v1/simulations")).await
    }

    pub async fn outcome(&self, mission_id: &str) -> Result<Value> {
        self.get(self.url(&format!("/v1/missions/{mission_id}/outcome")))
            .await
    }

    async fn post(&self, url: String, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;
        read_json(response).await
    }

    async fn get(&self, url: String) -> Result<Value> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        read_json(response).await
    }
}

async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response.json().await.context("Failed to parse response")?;
    if !status.is_success() {
        let error = body["error"].as_str().unwrap_or("request failed");
        match body["hint"].as_str() {
            Some(hint) => bail!("{status}: {error} ({hint})"),
            None => bail!("{status}: {error}"),
        }
    }
    Ok(body)
}
