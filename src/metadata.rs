//! Off-chain metadata service client for token launch flows.
//!
//! Opaque HTTP dependency: we upload token metadata and get back a content
//! URI plus a mined deployment salt. It has its own timeout and bounded
//! retry policy and is not on the trading hot path.

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Serialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub description: String,
    /// Base64-encoded image payload, when the launch ships one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LaunchAssets {
    /// Content URI for the uploaded metadata.
    pub uri: String,
    /// Deployment salt mined by the service.
    pub salt: String,
}

pub struct MetadataClient {
    http: reqwest::Client,
    base_url: String,
}

impl MetadataClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Upload metadata, retrying transient failures a bounded number of
    /// times with a linear backoff.
    pub async fn upload(&self, metadata: &TokenMetadata) -> Result<LaunchAssets> {
        let url = format!("{}/metadata", self.base_url);
        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_upload(&url, metadata).await {
                Ok(assets) => return Ok(assets),
                Err(e) => {
                    warn!(attempt, error = %e, "[META] upload failed");
                    last_error = Some(e);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AppError::Other("metadata upload failed".into())))
    }

    async fn try_upload(&self, url: &str, metadata: &TokenMetadata) -> Result<LaunchAssets> {
        let response = self.http.post(url).json(metadata).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Other(format!(
                "metadata service returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imageless_metadata_omits_the_field() {
        let metadata = TokenMetadata {
            name: "Launch".into(),
            symbol: "LNCH".into(),
            description: "test token".into(),
            image: None,
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert!(value.get("image").is_none());
        assert_eq!(value["symbol"], "LNCH");
    }

    #[test]
    fn launch_assets_parse_from_service_response() {
        let assets: LaunchAssets =
            serde_json::from_str(r#"{"uri":"ipfs://abc","salt":"0x01"}"#).unwrap();
        assert_eq!(assets.uri, "ipfs://abc");
        assert_eq!(assets.salt, "0x01");
    }
}
