use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::error::BackendError;
use super::types::{ApplicationReceipt, ApplicationRequest};
use crate::action::{ActionError, ApplyAction};
use crate::coordinator::Item;

const APPLICATIONS_PATH: &str = "/applications";

/// Submits applications to the backend service that fills and sends the forms.
pub struct BackendClient {
    api_key: String,
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}{APPLICATIONS_PATH}", self.base_url)
    }

    pub async fn submit(&self, item: &Item) -> Result<ApplicationReceipt, BackendError> {
        let mut request = self
            .client
            .post(self.endpoint())
            .header("content-type", "application/json")
            .json(&ApplicationRequest::from(item));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or(1000);
            return Err(BackendError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        // The receipt is informational; an empty or non-JSON body still counts.
        let receipt = response.json::<ApplicationReceipt>().await.unwrap_or_default();
        debug!(item_id = %item.id, receipt_id = ?receipt.id, "backend accepted application");
        Ok(receipt)
    }
}

impl ApplyAction for BackendClient {
    async fn apply(&self, item: Item) -> Result<(), ActionError> {
        self.submit(&item).await?;
        Ok(())
    }
}
