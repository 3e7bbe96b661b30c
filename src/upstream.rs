use crate::config::UpstreamConfig;
use crate::error::AnalysisError;
use crate::openai::{OpenAIRequest, OpenAIResponse, OpenAIResponseMessage};
use crate::request_id::{REQUEST_ID_HEADER, RequestId};
use reqwest::StatusCode;
use reqwest::header::HeaderValue;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("rate limited by upstream: {body}")]
    RateLimited { body: String },

    #[error("upstream rejected the request: {body}")]
    Rejected { body: String },

    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to reach upstream: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected upstream response: {0}")]
    Decode(String),
}

impl From<UpstreamError> for AnalysisError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::RateLimited { .. } => AnalysisError::UpstreamRateLimited,
            UpstreamError::Rejected { body } => AnalysisError::UpstreamRejected(body),
            other => AnalysisError::UpstreamUnavailable(other.to_string()),
        }
    }
}

/// Client for the OpenAI-compatible chat completions endpoint.
#[derive(Debug)]
pub struct VisionClient {
    http_client: Arc<reqwest::Client>,
    upstream: UpstreamConfig,
    api_key: String,
}

impl VisionClient {
    pub fn new(http_client: Arc<reqwest::Client>, upstream: UpstreamConfig, api_key: String) -> Self {
        Self { http_client, upstream, api_key }
    }

    fn target_url(&self) -> String {
        let api_base = &self.upstream.api_base;
        let path = "chat/completions";
        if api_base.ends_with('/') { format!("{}{}", api_base, path) } else { format!("{}/{}", api_base, path) }
    }

    /// Sends `data_url` as the sole image and returns the first choice's message.
    pub async fn analyze(
        &self,
        data_url: String,
        request_id: &RequestId,
    ) -> Result<OpenAIResponseMessage, UpstreamError> {
        let body = OpenAIRequest::vision(&self.upstream, data_url);
        let target_url = self.target_url();

        let mut target_request = self
            .http_client
            .post(&target_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key));

        if let Ok(val) = HeaderValue::from_str(&request_id.0) {
            target_request = target_request.header(REQUEST_ID_HEADER, val);
        }

        info!("Forwarding image to: {} (model {})", target_url, self.upstream.model);
        let response = target_request.json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Upstream request failed with status {}: {}", status, body);
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited { body },
                StatusCode::BAD_REQUEST => UpstreamError::Rejected { body },
                _ => UpstreamError::Status { status, body },
            });
        }

        let completion: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        debug!("upstream usage: {:?}", completion.usage);

        let message = completion
            .into_first_message()
            .ok_or_else(|| UpstreamError::Decode("response has no choices".to_string()))?;
        if message.content.is_none() {
            return Err(UpstreamError::Decode("response message has no content".to_string()));
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(url: &str) -> VisionClient {
        let upstream = UpstreamConfig {
            api_base: format!("{}/v1", url),
            ..UpstreamConfig::default()
        };
        VisionClient::new(Arc::new(reqwest::Client::new()), upstream, "sk-test".to_string())
    }

    #[test]
    fn test_target_url() {
        let mut client = client_for("http://localhost:1");
        assert_eq!(client.target_url(), "http://localhost:1/v1/chat/completions");
        client.upstream.api_base = "http://localhost:1/v1/".to_string();
        assert_eq!(client.target_url(), "http://localhost:1/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_analyze_success() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_header("x-request-id", "req-1")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"model": "gpt-4o", "max_tokens": 2500})),
                Matcher::Regex(r#""image_url":\{"url":"data:image/png;base64,AAAA"\}"#.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"choices": [{"message": {"role": "assistant", "content": "X"}}]}).to_string())
            .create_async()
            .await;

        let client = client_for(&server.url());
        let message = client
            .analyze("data:image/png;base64,AAAA".to_string(), &RequestId("req-1".to_string()))
            .await
            .expect("analysis failed");

        assert_eq!(message.role, "assistant");
        assert_eq!(message.content.as_deref(), Some("X"));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_analyze_status_mapping() {
        let cases = [
            (429, "RateLimited"),
            (400, "Rejected"),
            (401, "Status"),
            (503, "Status"),
        ];
        for (status, expected) in cases {
            let mut server = mockito::Server::new_async().await;
            let _m = server
                .mock("POST", "/v1/chat/completions")
                .with_status(status)
                .with_body(r#"{"error":{"message":"upstream says no"}}"#)
                .create_async()
                .await;

            let err = client_for(&server.url())
                .analyze("data:image/png;base64,AAAA".to_string(), &RequestId("r".to_string()))
                .await
                .unwrap_err();
            let actual = match err {
                UpstreamError::RateLimited { .. } => "RateLimited",
                UpstreamError::Rejected { .. } => "Rejected",
                UpstreamError::Status { .. } => "Status",
                UpstreamError::Transport(_) => "Transport",
                UpstreamError::Decode(_) => "Decode",
            };
            assert_eq!(actual, expected, "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_analyze_empty_choices_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = client_for(&server.url())
            .analyze("data:image/png;base64,AAAA".to_string(), &RequestId("r".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
        assert!(matches!(AnalysisError::from(err), AnalysisError::UpstreamUnavailable(_)));
    }

    #[test]
    fn test_rate_limit_maps_to_fixed_error() {
        let err: AnalysisError = UpstreamError::RateLimited { body: "slow down, org-123".into() }.into();
        assert!(matches!(err, AnalysisError::UpstreamRateLimited));
    }
}
