//! Client for the remote processing function.
//!
//! The uploaded CUR export is forwarded as a multipart payload with the
//! server-held API key injected as `x-api-key`. The multipart encoder sets
//! the content type; we never override it. Failures at this boundary always
//! become structured `{"detail": ...}` errors with a forwarded status code,
//! never a propagated parse exception.

use std::time::Duration;

use anyhow::Context;
use axum::http::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::errors::Error;
use crate::report::ConsumptionRecord;

/// Header carrying the injected credential.
const API_KEY_HEADER: &str = "x-api-key";

/// Error body shape used by the processing function.
#[derive(Debug, Deserialize)]
struct ProcessorErrorBody {
    detail: String,
}

pub struct ProcessorClient {
    http: reqwest::Client,
    url: Url,
    api_key: String,
}

impl ProcessorClient {
    /// Build the client from validated configuration. Called once at
    /// startup; missing settings fail here, before any request is served.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let url = config.processor.url.clone().context("processor.url is not configured")?;
        let api_key = config.processor.api_key.clone().context("processor.api_key is not configured")?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.processor.timeout_secs))
            .build()
            .context("Failed to create processor HTTP client")?;

        Ok(Self { http, url, api_key })
    }

    /// Forward one uploaded file and return the parsed record batch.
    pub async fn process(&self, filename: &str, contents: Vec<u8>) -> Result<Vec<ConsumptionRecord>, Error> {
        let size = contents.len();
        let part = reqwest::multipart::Part::bytes(contents).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::info!(filename, size, "Forwarding upload to processing function");

        let response = self
            .http
            .post(self.url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Processing function unreachable: {e}");
                Error::Processor {
                    status: StatusCode::BAD_GATEWAY,
                    detail: "Processing service is unreachable".to_string(),
                }
            })?;

        let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.text().await.map_err(|e| {
            tracing::error!("Failed to read processing function response: {e}");
            Error::Processor {
                status: StatusCode::BAD_GATEWAY,
                detail: "Failed to read processing service response".to_string(),
            }
        })?;

        if !status.is_success() {
            // Forward the original status; fall back to the raw body (or a
            // generic message) when it is not the structured error shape.
            let detail = match serde_json::from_str::<ProcessorErrorBody>(&body) {
                Ok(parsed) => parsed.detail,
                Err(_) if body.trim().is_empty() => "Processing service error".to_string(),
                Err(_) => body,
            };
            return Err(Error::Processor { status, detail });
        }

        serde_json::from_str::<Vec<ConsumptionRecord>>(&body).map_err(|e| {
            tracing::error!("Processing function returned an unparseable body: {e}");
            Error::Processor {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: "Invalid response from processing service".to_string(),
            }
        })
    }
}
