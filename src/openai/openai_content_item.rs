use crate::openai::OpenAIImageUrl;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIContentItem {
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<OpenAIImageUrl>,
}

impl OpenAIContentItem {
    pub fn image_url(url: String) -> Self {
        Self {
            r#type: "image_url".to_string(),
            text: None,
            image_url: Some(OpenAIImageUrl { url }),
        }
    }
}
