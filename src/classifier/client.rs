use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::types::{Detection, NavigationHint};
use super::OverlayClassifier;
use crate::config::Config;
use crate::error::{PageclearError, Result};

/// Vision classifier API client
pub struct ClassifierClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: String,
}

impl ClassifierClient {
    /// Create a new classifier client from config
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.classifier.timeout_secs))
            .build()
            .map_err(|e| {
                PageclearError::ClassifierError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.classifier.base_url.clone(),
            api_key: config.classifier.api_key.clone(),
        })
    }

    /// Build a request with common headers
    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.post(&url);

        if let Some(ref key) = self.api_key {
            req = req.header("X-API-Key", key);
        }

        req.header("Content-Type", "application/json")
    }

    /// Handle API response
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| {
                PageclearError::ClassifierError(format!("Failed to parse response: {}", e))
            })
        } else {
            let error_msg = match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    "Rate limited. Please try again later.".to_string()
                }
                StatusCode::UNAUTHORIZED => "Invalid or missing API key".to_string(),
                StatusCode::UNPROCESSABLE_ENTITY => {
                    // Content filtering rejects some screenshots outright
                    "Screenshot rejected by content filter".to_string()
                }
                _ => match response.json::<ApiErrorResponse>().await {
                    Ok(err) => err.message,
                    Err(_) => format!("API error: {}", status),
                },
            };
            Err(PageclearError::ClassifierError(error_msg))
        }
    }
}

#[async_trait]
impl OverlayClassifier for ClassifierClient {
    async fn detect_overlay(&self, screenshot: &[u8], page_url: &str) -> Result<Detection> {
        let body = serde_json::json!({
            "screenshot": base64::engine::general_purpose::STANDARD.encode(screenshot),
            "url": page_url,
        });

        let response = self
            .request("/v1/detect-overlay")
            .json(&body)
            .send()
            .await
            .map_err(|e| PageclearError::ClassifierError(format!("Request failed: {}", e)))?;

        self.handle_response(response).await
    }

    async fn navigation_help(
        &self,
        screenshot: &[u8],
        button_texts: &[String],
    ) -> Result<NavigationHint> {
        let body = serde_json::json!({
            "screenshot": base64::engine::general_purpose::STANDARD.encode(screenshot),
            "buttonTexts": button_texts,
        });

        let response = self
            .request("/v1/navigation-help")
            .json(&body)
            .send()
            .await
            .map_err(|e| PageclearError::ClassifierError(format!("Request failed: {}", e)))?;

        self.handle_response(response).await
    }
}
