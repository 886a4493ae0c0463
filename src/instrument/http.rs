//! Blocking HTTP/JSON instrument client.
//!
//! Each operation is a `POST {"method": ..., "params": [...]}` to the
//! daemon's endpoint, answered with `{"result": ...}` or `{"error": "..."}`.
//! Every request carries the connect/read timeout configured at
//! construction, so a wedged daemon surfaces as a bounded transport fault
//! instead of a hung polling cycle.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ClientError, InstrumentClient, Measured};

pub struct HttpClient {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

impl HttpClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "method": method, "params": params }))
            .send()
            .map_err(|e| ClientError::Transport(format!("{method} request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ClientError::Transport(format!(
                "{method} request failed with status {}.",
                resp.status()
            )));
        }

        let body: RpcResponse = resp
            .json()
            .map_err(|e| ClientError::Protocol(format!("Bad {method} response body: {e}")))?;

        if let Some(error) = body.error {
            return Err(ClientError::Protocol(format!("{method} failed: {error}")));
        }
        Ok(body.result)
    }

    fn call_as<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ClientError> {
        let result = self.call(method, params)?;
        serde_json::from_value(result)
            .map_err(|e| ClientError::Protocol(format!("Unexpected {method} result shape: {e}")))
    }
}

impl InstrumentClient for HttpClient {
    fn measure(&mut self) -> Result<(), ClientError> {
        self.call("measure", json!([]))?;
        Ok(())
    }

    fn busy(&mut self) -> Result<bool, ClientError> {
        self.call_as("busy", json!([]))
    }

    fn get_measurement_id(&mut self) -> Result<i64, ClientError> {
        self.call_as("get_measurement_id", json!([]))
    }

    fn get_measured(&mut self) -> Result<Measured, ClientError> {
        self.call_as("get_measured", json!([]))
    }

    fn get_mappings(&mut self) -> Result<BTreeMap<String, Vec<f64>>, ClientError> {
        self.call_as("get_mappings", json!([]))
    }

    fn get_integration_time_micros(&mut self) -> Result<i64, ClientError> {
        self.call_as("get_integration_time_micros", json!([]))
    }

    fn get_channel_units(&mut self) -> Result<BTreeMap<String, Option<String>>, ClientError> {
        self.call_as("get_channel_units", json!([]))
    }

    fn shutdown(&mut self, restart: bool) -> Result<(), ClientError> {
        self.call("shutdown", json!([restart]))?;
        Ok(())
    }
}
