use serde::{Deserialize, Serialize};

/// Body of every failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of a successful analysis: the model's message, unmodified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub role: String,
    pub content: String,
}

/// An image as received from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSubmission {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub file_name: Option<String>,
}

impl ImageSubmission {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_image(&self) -> bool {
        is_image_mime(&self.mime)
    }
}

pub fn is_image_mime(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("image/")
}
