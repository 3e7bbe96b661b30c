use crate::config::{Config, Limits};
use crate::encoding::{DEFAULT_MIME, estimate_encoded_len, to_data_url};
use crate::error::AnalysisError;
use crate::models::{AnalysisResponse, ImageSubmission, is_image_mime};
use crate::request_id::{RequestId, inject_request_id};
use crate::upstream::VisionClient;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::{
        HeaderValue, Method, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_MAX_AGE,
        },
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, info};

pub const IMAGE_FIELD: &str = "image";
pub const MISSING_IMAGE_MESSAGE: &str =
    "No image provided. Please include an image in the form data with key \"image\".";
const EMPTY_IMAGE_MESSAGE: &str = "The uploaded image is empty. Please choose a different image.";

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub vision_client: Arc<VisionClient>,
}

impl AppState {
    pub fn new(config: Config, http_client: Arc<reqwest::Client>, api_key: String) -> Self {
        let vision_client = VisionClient::new(http_client, config.upstream.clone(), api_key);
        Self {
            config: Arc::new(config),
            vision_client: Arc::new(vision_client),
        }
    }
}

/// Builds the service: the analysis route on `/` and `/analyze`, a health
/// route, and CORS headers on every response including panics and 405s.
pub fn app(state: AppState) -> Router {
    let analysis = post(analyze_image)
        .options(preflight)
        .fallback(method_not_allowed);

    let routes = Router::new()
        .route("/", analysis.clone())
        .route("/analyze", analysis)
        .route("/health", get(|| async { "OK" }));
    with_layers(routes, &state.config.limits).with_state(state)
}

/// Wraps routes in the body limit, panic catcher, request-id middleware and
/// the CORS headers. The CORS layers sit outermost so they also decorate
/// responses produced by the inner layers.
fn with_layers(routes: Router<AppState>, limits: &Limits) -> Router<AppState> {
    let body_limit = usize::try_from(limits.max_body_bytes).unwrap_or(usize::MAX);

    routes
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(inject_request_id))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
}

async fn preflight() -> impl IntoResponse {
    (StatusCode::OK, [(ACCESS_CONTROL_MAX_AGE, "86400")])
}

async fn method_not_allowed(method: Method) -> AnalysisError {
    info!("Rejecting {} request", method);
    AnalysisError::MethodNotAllowed
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown internal error".to_string()
    };
    AnalysisError::Internal(message).into_response()
}

#[axum_macros::debug_handler]
pub async fn analyze_image(
    State(state): State<AppState>,
    request_id: RequestId,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>, AnalysisError> {
    let mut multipart = multipart.map_err(|rejection| {
        debug!("Multipart rejection: {}", rejection.body_text());
        AnalysisError::InvalidInput(MISSING_IMAGE_MESSAGE.to_string())
    })?;
    let limits = &state.config.limits;

    let submission = read_image_field(&mut multipart, limits).await?;
    info!(
        "Image received: name={:?} size={} type={}",
        submission.file_name,
        submission.len(),
        submission.mime
    );

    check_encoded_size(submission.len() as u64, limits)?;

    let data_url = to_data_url(Some(&submission.mime), &submission.bytes, limits.encode_chunk_size);
    debug!("Data URL built: {} characters", data_url.len());

    let message = state.vision_client.analyze(data_url, &request_id).await?;
    info!("Analysis completed");
    Ok(Json(AnalysisResponse {
        role: message.role,
        content: message.content.unwrap_or_default(),
    }))
}

/// Finds the `image` field and buffers it, enforcing the declared-type and
/// raw-size gates. Other fields are skipped.
async fn read_image_field(
    multipart: &mut Multipart,
    limits: &Limits,
) -> Result<ImageSubmission, AnalysisError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(AnalysisError::InvalidInput(MISSING_IMAGE_MESSAGE.to_string())),
            Err(e) => return Err(multipart_error(e, limits)),
        };
        if field.name() != Some(IMAGE_FIELD) {
            debug!("Skipping form field {:?}", field.name());
            continue;
        }

        let mime = match field.content_type() {
            Some(mime) if !is_image_mime(mime) => {
                return Err(AnalysisError::InvalidInput(format!(
                    "Unsupported file type '{}'. Please upload an image.",
                    mime
                )));
            }
            Some(mime) => mime.to_string(),
            None => DEFAULT_MIME.to_string(),
        };
        let file_name = field.file_name().map(str::to_string);
        let bytes = read_capped(field, limits).await?;
        let submission = ImageSubmission { bytes, mime, file_name };
        if submission.is_empty() {
            return Err(AnalysisError::InvalidInput(EMPTY_IMAGE_MESSAGE.to_string()));
        }
        return Ok(submission);
    }
}

/// Streams a field into memory. Past `max_image_bytes` the data is only
/// counted so the rejection can report the real size.
async fn read_capped(mut field: Field<'_>, limits: &Limits) -> Result<Vec<u8>, AnalysisError> {
    let mut buffer = Vec::new();
    let mut total: u64 = 0;
    let mut overflow = false;

    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limits))? {
        total += chunk.len() as u64;
        if overflow {
            continue;
        }
        if total > limits.max_image_bytes {
            overflow = true;
            buffer = Vec::new();
        } else {
            buffer.extend_from_slice(&chunk);
        }
    }

    if overflow {
        return Err(AnalysisError::PayloadTooLarge {
            size: Some(total),
            limit: limits.max_image_bytes,
        });
    }
    Ok(buffer)
}

fn multipart_error(err: MultipartError, limits: &Limits) -> AnalysisError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AnalysisError::PayloadTooLarge {
            size: None,
            limit: limits.max_image_bytes,
        }
    } else {
        AnalysisError::ReadFailure(err.body_text())
    }
}

fn check_encoded_size(len: u64, limits: &Limits) -> Result<(), AnalysisError> {
    let Some(threshold) = limits.encoded_check_threshold else {
        return Ok(());
    };
    if len <= threshold {
        return Ok(());
    }
    let estimate = estimate_encoded_len(len);
    if estimate > limits.max_encoded_bytes {
        return Err(AnalysisError::EncodedTooLarge {
            estimate,
            limit: limits.max_encoded_bytes,
        });
    }
    Ok(())
}
