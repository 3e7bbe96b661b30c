use crate::client::ClientError;
use crate::models::{ImageSubmission, is_image_mime};
use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

const EXTENSION_MIME: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("jfif", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("avif", "image/avif"),
    ("ico", "image/x-icon"),
    ("svg", "image/svg+xml"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("json", "application/json"),
];

const UNKNOWN_MIME: &str = "application/octet-stream";

/// Declared type of a file, judged by its extension.
pub fn mime_from_path(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return UNKNOWN_MIME;
    };
    let ext = ext.to_ascii_lowercase();
    EXTENSION_MIME
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(UNKNOWN_MIME)
}

/// Loads a file as a submission. Non-image types are rejected before the
/// file is read.
pub fn read_submission(path: &Path) -> Result<ImageSubmission, ClientError> {
    let mime = mime_from_path(path);
    if !is_image_mime(mime) {
        return Err(ClientError::NotAnImage { mime: mime.to_string() });
    }
    let bytes = std::fs::read(path)?;
    Ok(ImageSubmission {
        bytes,
        mime: mime.to_string(),
        file_name: path.file_name().and_then(|n| n.to_str()).map(str::to_string),
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality between 0.0 and 1.0
    pub quality: f32,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self { max_width: 1920, max_height: 1080, quality: 0.8 }
    }
}

fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8
}

/// Downscales (keeping the aspect ratio) when either side exceeds its bound
/// and re-encodes as JPEG. Returns a new submission.
pub fn compress(submission: &ImageSubmission, options: &CompressOptions) -> Result<ImageSubmission, ClientError> {
    let decoded = image::load_from_memory(&submission.bytes).map_err(|e| {
        debug!("Failed to decode image: {}", e);
        ClientError::Processing(e.to_string())
    })?;
    let (width, height) = (decoded.width(), decoded.height());

    let resized = if width > options.max_width || height > options.max_height {
        decoded.resize(options.max_width, options.max_height, FilterType::Triangle)
    } else {
        decoded
    };

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(resized.to_rgb8())
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Jpeg(jpeg_quality(options.quality)))
        .map_err(|e| {
            debug!("Failed to encode image: {}", e);
            ClientError::Processing(e.to_string())
        })?;

    info!(
        "Compressed image {}x{} ({} bytes) -> {}x{} ({} bytes)",
        width,
        height,
        submission.len(),
        resized.width(),
        resized.height(),
        bytes.len()
    );

    Ok(ImageSubmission {
        bytes,
        mime: "image/jpeg".to_string(),
        file_name: submission
            .file_name
            .as_ref()
            .map(|name| Path::new(name).with_extension("jpg").to_string_lossy().into_owned()),
    })
}
