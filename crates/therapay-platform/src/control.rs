//! Remote call control client
//!
//! HTTP client for the platform's call management API. Only one operation is
//! needed: deleting a call, which ends the session for every participant.
//! The platform answers the deletion with its own `call.ended` webhook, so
//! the lifecycle engine must stay idempotent against that echo.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use therapay_core::{traits::CallControl, AppError, AppResult};
use tracing::{debug, error, instrument};

/// HTTP implementation of [`CallControl`]
#[derive(Clone)]
pub struct PlatformCallControl {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PlatformCallControl {
    /// Create a new call control client
    ///
    /// `timeout_secs` bounds each request so a slow platform API cannot
    /// stall webhook processing.
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::PlatformApi(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl CallControl for PlatformCallControl {
    #[instrument(skip(self))]
    async fn end_call(&self, call_type: &str, call_id: &str) -> AppResult<()> {
        let url = format!("{}/calls/{}/{}", self.base_url, call_type, call_id);
        debug!("Deleting platform call {}:{}", call_type, call_id);

        let response = self
            .client
            .delete(&url)
            .header("Authorization", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                error!("Platform API request failed for {}: {}", url, e);
                AppError::PlatformApi(format!("Call deletion request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(
                "Platform API returned {} deleting call {}:{}: {}",
                status, call_type, call_id, body
            );
            return Err(AppError::PlatformApi(format!(
                "Call deletion returned {}",
                status
            )));
        }

        debug!("Platform call {}:{} deleted", call_type, call_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let control = PlatformCallControl::new("https://api.example.com/v1/", "key", 5).unwrap();
        assert_eq!(control.base_url, "https://api.example.com/v1");
    }

    #[tokio::test]
    #[ignore] // Requires a reachable platform API
    async fn test_end_unknown_call_fails() {
        let base = std::env::var("PLATFORM_API_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3030".to_string());
        let control = PlatformCallControl::new(&base, "test-key", 2).unwrap();
        let result = control.end_call("default", "no-such-call").await;
        assert!(result.is_err());
    }
}
