//! JSON asset indexes served at a package's download URL
//!
//! Some projects publish a JSON document (a manifest of builds with URLs and
//! checksums) where other projects publish the binary itself. The index is
//! optional: any failure to fetch or parse it means "no index".

#[cfg(test)]
use mockall::automock;

use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait AssetIndex: Send + Sync {
    /// Fetch `url` and return its body when the response is JSON
    async fn fetch_json(&self, url: &str) -> Option<Value>;
}

pub struct HttpAssetIndex {
    http: reqwest::Client,
}

impl HttpAssetIndex {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl AssetIndex for HttpAssetIndex {
    async fn fetch_json(&self, url: &str) -> Option<Value> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .inspect_err(|e| debug!("Failed to fetch asset index {}: {}", url, e))
            .ok()?;

        if !response.status().is_success() {
            debug!("Asset index {} returned status {}", url, response.status());
            return None;
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        if !is_json {
            return None;
        }

        response
            .json::<Value>()
            .await
            .inspect_err(|e| debug!("Asset index {} is not valid JSON: {}", url, e))
            .ok()
    }
}
