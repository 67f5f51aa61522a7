use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use shared::protocol::{PredictResponse, PREDICT_FILE_FIELD};
use tracing::{info, warn};
use url::Url;

use crate::{
    asset::AssetId,
    config::{predict_endpoint, ClientSettings},
    error::{PredictionError, SettingsError},
};

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub asset_id: AssetId,
    pub file_name: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

/// Returns the raw class code; range validation is left to the catalog.
#[async_trait]
pub trait RoastPredictor: Send + Sync {
    async fn predict(&self, upload: ImageUpload) -> Result<i64, PredictionError>;
}

pub struct PredictionClient {
    http: Client,
    endpoint: Url,
}

impl PredictionClient {
    pub fn new(base_url: &str) -> Result<Self, SettingsError> {
        Self::with_timeout(base_url, ClientSettings::default().request_timeout())
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, SettingsError> {
        let endpoint = predict_endpoint(base_url)?;
        Ok(Self::with_http_client(http_client(timeout)?, endpoint))
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, SettingsError> {
        let endpoint = settings.predict_endpoint()?;
        let http = http_client(settings.request_timeout())?;
        Ok(Self::with_http_client(http, endpoint))
    }

    pub fn with_http_client(http: Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn submit(&self, upload: &ImageUpload) -> Result<i64, PredictionError> {
        let form = Form::new().part(PREDICT_FILE_FIELD, file_part(upload));
        info!(
            asset_id = %upload.asset_id,
            endpoint = %self.endpoint,
            bytes = upload.bytes.len(),
            "prediction: posting image"
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                warn!(asset_id = %upload.asset_id, "prediction: transport failure: {err}");
                PredictionError::Unreachable {
                    reason: err.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(asset_id = %upload.asset_id, status = status.as_u16(), "prediction: request rejected");
            return Err(PredictionError::RequestRejected {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| PredictionError::Unreachable {
                reason: format!("failed to read response body: {err}"),
            })?;
        let parsed: PredictResponse = serde_json::from_slice(&body).map_err(|err| {
            warn!(asset_id = %upload.asset_id, "prediction: malformed response: {err}");
            PredictionError::MalformedResponse {
                reason: err.to_string(),
            }
        })?;

        info!(asset_id = %upload.asset_id, code = parsed.class, "prediction: received class");
        Ok(parsed.class)
    }
}

// A zero timeout would fail every request as unreachable.
fn http_client(timeout: Duration) -> Result<Client, SettingsError> {
    if timeout.is_zero() {
        return Err(SettingsError::ZeroTimeout);
    }
    Ok(Client::builder().timeout(timeout).build()?)
}

#[async_trait]
impl RoastPredictor for PredictionClient {
    async fn predict(&self, upload: ImageUpload) -> Result<i64, PredictionError> {
        self.submit(&upload).await
    }
}

fn file_part(upload: &ImageUpload) -> Part {
    let part = || Part::bytes(upload.bytes.to_vec()).file_name(upload.file_name.clone());
    part()
        .mime_str(&upload.media_type)
        .unwrap_or_else(|_| part())
}

#[cfg(test)]
#[path = "tests/prediction_tests.rs"]
mod tests;
