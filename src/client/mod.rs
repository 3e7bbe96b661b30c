//! Command-line counterpart of the browser uploader: picks an image, shrinks
//! it, posts it to the analysis endpoint and keeps the outcome.

pub mod imaging;
pub mod status;

use crate::config::MIB;
use crate::error::as_mb;
use crate::handler::IMAGE_FIELD;
use crate::models::{ErrorResponse, ImageSubmission};
use imaging::{CompressOptions, compress, read_submission};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use status::status_message;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Please choose a valid image file (got {mime}).")]
    NotAnImage { mime: String },

    #[error("Please choose an image first.")]
    NoImageSelected,

    #[error("Image too large. Maximum size is {}. Current size: {}", mb(.limit), mb(.size))]
    TooLarge { size: u64, limit: u64 },

    #[error("Failed to read file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to process image.")]
    Processing(String),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Failed to analyze image: {0}")]
    Rejected(String),

    #[error("Could not reach the analysis service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response from the analysis service: {0}")]
    InvalidResponse(String),
}

fn mb(bytes: &u64) -> String {
    as_mb(*bytes)
}

pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * MIB;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploaderState {
    Idle,
    Ready,
    Analyzing,
    ResultDisplayed,
    ErrorDisplayed,
}

/// Owns the selected image and the outcome of the last submission.
#[derive(Debug)]
pub struct Uploader {
    http_client: reqwest::Client,
    endpoint: String,
    compression: Option<CompressOptions>,
    max_image_bytes: u64,
    selected: Option<ImageSubmission>,
    state: UploaderState,
    result: Option<String>,
    last_error: Option<String>,
}

impl Uploader {
    pub fn new(http_client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            compression: None,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            selected: None,
            state: UploaderState::Idle,
            result: None,
            last_error: None,
        }
    }

    pub fn with_compression(mut self, compression: Option<CompressOptions>) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: u64) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    pub fn state(&self) -> UploaderState {
        self.state
    }

    pub fn selected(&self) -> Option<&ImageSubmission> {
        self.selected.as_ref()
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn select_image(&mut self, path: &Path) -> Result<(), ClientError> {
        match read_submission(path) {
            Ok(submission) => self.admit(submission),
            Err(e) => self.fail(e).map(|_| ()),
        }
    }

    pub fn select_bytes(
        &mut self,
        bytes: Vec<u8>,
        mime: &str,
        file_name: Option<String>,
    ) -> Result<(), ClientError> {
        self.admit(ImageSubmission { bytes, mime: mime.to_string(), file_name })
    }

    pub fn remove_image(&mut self) {
        self.selected = None;
        self.result = None;
        self.last_error = None;
        self.state = UploaderState::Idle;
    }

    /// Posts the selected image and returns the Markdown analysis. Taking
    /// `&mut self` keeps a second submission from starting while one is in
    /// flight.
    pub async fn submit(&mut self) -> Result<String, ClientError> {
        let Some(selected) = self.selected.clone() else {
            return self.fail(ClientError::NoImageSelected);
        };
        if let Err(e) = self.validate(&selected) {
            return self.fail(e);
        }

        self.state = UploaderState::Analyzing;
        self.result = None;
        self.last_error = None;

        match self.send(selected).await {
            Ok(content) => {
                self.state = UploaderState::ResultDisplayed;
                self.result = Some(content.clone());
                Ok(content)
            }
            Err(e) => self.fail(e),
        }
    }

    fn validate(&self, submission: &ImageSubmission) -> Result<(), ClientError> {
        if !submission.is_image() {
            return Err(ClientError::NotAnImage { mime: submission.mime.clone() });
        }
        let size = submission.len() as u64;
        if size > self.max_image_bytes {
            return Err(ClientError::TooLarge { size, limit: self.max_image_bytes });
        }
        Ok(())
    }

    /// Rejected selections leave any earlier valid one in place.
    fn admit(&mut self, submission: ImageSubmission) -> Result<(), ClientError> {
        if let Err(e) = self.validate(&submission) {
            return self.fail(e).map(|_| ());
        }
        self.accept(submission);
        Ok(())
    }

    fn accept(&mut self, submission: ImageSubmission) {
        debug!("Selected {:?} ({} bytes, {})", submission.file_name, submission.len(), submission.mime);
        self.selected = Some(submission);
        self.result = None;
        self.last_error = None;
        self.state = UploaderState::Ready;
    }

    fn fail(&mut self, err: ClientError) -> Result<String, ClientError> {
        warn!("Uploader error: {}", err);
        self.last_error = Some(err.to_string());
        self.state = UploaderState::ErrorDisplayed;
        Err(err)
    }

    async fn send(&self, submission: ImageSubmission) -> Result<String, ClientError> {
        let submission = match self.compression {
            Some(options) => tokio::task::spawn_blocking(move || compress(&submission, &options))
                .await
                .map_err(|e| ClientError::Processing(e.to_string()))??,
            None => submission,
        };

        let file_name = submission.file_name.clone().unwrap_or_else(|| "image".to_string());
        let part = Part::bytes(submission.bytes)
            .file_name(file_name)
            .mime_str(&submission.mime)
            .map_err(|e| ClientError::Processing(e.to_string()))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        info!("Submitting image to {}", self.endpoint);
        let response = self.http_client.post(&self.endpoint).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let server_error = response.json::<ErrorResponse>().await.ok().map(|body| body.error);
            debug!("Analysis service answered {} with {:?}", status, server_error);
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: status_message(status.as_u16(), server_error.as_deref()),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        interpret_body(body)
    }
}

fn interpret_body(body: Value) -> Result<String, ClientError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
        return Err(ClientError::Rejected(message));
    }
    body.get("content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::InvalidResponse("missing content".to_string()))
}
