//! Client for the presigned-URL broker in front of the remote blob store.
//!
//! Every transfer takes two requests:
//!
//! 1. `POST {broker}/get-presigned-url` with `{"filename": ..., "action": "getObject"|"putObject"}`,
//!    answered with `{"url": ...}`.
//! 2. `GET` or `PUT` against the returned URL.
//!
//! On the download path a `404` or `403` from either request means nothing has been stored for
//! that file yet and is reported as [`StoreError::NotFound`].

use crate::constants::{HTTP_TIMEOUT_SECS, PRESIGN_ENDPOINT};
use crate::{StoreError, StoreResult};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GET_OBJECT: &str = "getObject";
const PUT_OBJECT: &str = "putObject";

#[derive(Serialize)]
struct PresignRequest<'a> {
    filename: &'a str,
    action: &'a str,
}

#[derive(Deserialize)]
struct PresignResponse {
    url: String,
}

#[derive(Debug, Clone)]
pub struct BrokerClient {
    base_url: String,
    client: reqwest::Client,
}

impl BrokerClient {
    /// Creates a client for the broker at `base_url`.
    pub fn new(base_url: &str) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Downloads the object stored under `filename`.
    pub async fn get_object(&self, filename: &str) -> StoreResult<String> {
        let url = self.presign(filename, GET_OBJECT).await?;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        check_download_status(response.status())?;
        response.text().await.map_err(|e| self.network_error(e))
    }

    /// Uploads `body` under `filename`, replacing any previous object.
    pub async fn put_object(&self, filename: &str, body: String) -> StoreResult<()> {
        let url = self.presign(filename, PUT_OBJECT).await?;
        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Network(format!("upload failed with status {}", status)));
        }
        Ok(())
    }

    async fn presign(&self, filename: &str, action: &str) -> StoreResult<String> {
        let endpoint = format!("{}/{}", self.base_url, PRESIGN_ENDPOINT);
        let response = self
            .client
            .post(&endpoint)
            .json(&PresignRequest { filename, action })
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status();
        if action == GET_OBJECT {
            check_download_status(status)?;
        } else if !status.is_success() {
            return Err(StoreError::Network(format!(
                "broker answered with status {}",
                status
            )));
        }

        let parsed: PresignResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Network(format!("invalid broker response: {}", e)))?;

        tracing::debug!("presigned {} for {}", action, filename);
        Ok(parsed.url)
    }

    fn network_error(&self, e: reqwest::Error) -> StoreError {
        if e.is_connect() {
            StoreError::Network(format!("cannot connect to broker at {}", self.base_url))
        } else if e.is_timeout() {
            StoreError::Network(format!("request timed out after {}s", HTTP_TIMEOUT_SECS))
        } else {
            StoreError::Network(e.to_string())
        }
    }
}

fn check_download_status(status: StatusCode) -> StoreResult<()> {
    match status {
        StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Err(StoreError::NotFound),
        s if s.is_success() => Ok(()),
        s => Err(StoreError::Network(format!("download failed with status {}", s))),
    }
}
