use crate::config::UpstreamConfig;
use crate::openai::{OpenAIContent, OpenAIContentItem, OpenAIMessage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl OpenAIRequest {
    /// Builds a completion request whose only visual input is `data_url`,
    /// preceded by the configured system instruction.
    pub fn vision(upstream: &UpstreamConfig, data_url: String) -> Self {
        Self {
            model: upstream.model.clone(),
            messages: vec![
                OpenAIMessage {
                    role: "system".to_string(),
                    content: OpenAIContent::Text(upstream.system_prompt.clone()),
                },
                OpenAIMessage {
                    role: "user".to_string(),
                    content: OpenAIContent::Array(vec![OpenAIContentItem::image_url(data_url)]),
                },
            ],
            max_tokens: Some(upstream.max_tokens),
            temperature: Some(upstream.temperature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_request_shape() {
        let upstream = UpstreamConfig::default();
        let request = OpenAIRequest::vision(&upstream, "data:image/png;base64,AAAA".to_string());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["max_tokens"], 2500);
        assert_eq!(json["temperature"], 0.7);
        assert_eq!(json["messages"].as_array().unwrap().len(), 2);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], upstream.system_prompt.as_str());
        assert_eq!(json["messages"][1]["role"], "user");
        let content = json["messages"][1]["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "image_url");
        assert_eq!(content[0]["image_url"]["url"], "data:image/png;base64,AAAA");
        assert!(content[0].get("text").is_none());
    }
}
