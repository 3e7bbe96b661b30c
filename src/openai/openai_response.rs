use crate::openai::{OpenAIChoice, OpenAIResponseMessage, OpenAIUsage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<OpenAIChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<OpenAIUsage>,
}

impl OpenAIResponse {
    pub fn into_first_message(self) -> Option<OpenAIResponseMessage> {
        self.choices.into_iter().next().map(|choice| choice.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_response() {
        let response: OpenAIResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": "X"}}]})).unwrap();
        let message = response.into_first_message().unwrap();
        assert_eq!(message.role, "assistant");
        assert_eq!(message.content.as_deref(), Some("X"));
    }

    #[test]
    fn test_full_response() {
        let response: OpenAIResponse = serde_json::from_value(json!({
            "id": "chatcmpl-abc",
            "object": "chat.completion",
            "created": 1757841257,
            "model": "gpt-4o-2024-08-06",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "**Aspirin**", "refusal": null},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 800, "completion_tokens": 40, "total_tokens": 840}
        }))
        .unwrap();
        assert_eq!(response.usage.as_ref().unwrap().total_tokens, 840);
        assert_eq!(response.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.into_first_message().unwrap().content.unwrap(), "**Aspirin**");
    }

    #[test]
    fn test_empty_choices() {
        let response: OpenAIResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(response.into_first_message().is_none());
    }
}
