// image-convert/src/server/rest.rs
use super::ServerConfig;
use crate::core::request::ConversionRequest;
use crate::core::ConvertError;
use axum::{
    body::Bytes,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// Error body for the REST API.
///
/// Validation and conversion errors are the caller's fault (400, message
/// shown); anything else is a 500 with the detail kept in the log.
pub struct ApiError(pub ConvertError);

impl From<ConvertError> for ApiError {
    fn from(error: ConvertError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = if self.0.is_validation() || self.0.is_conversion() {
            log::warn!("Request rejected: {}", self.0);
            (StatusCode::BAD_REQUEST, self.0.to_string())
        } else {
            log::error!("Unexpected error: {}", self.0);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        };

        (status, Json(json!({ "error": message, "status": "error" }))).into_response()
    }
}

type ApiResult = std::result::Result<Json<Value>, ApiError>;

pub fn router(config: ServerConfig) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/tools", get(list_tools))
        .route("/api/convert/single", post(convert_single))
        .route("/api/convert/batch", post(convert_batch))
        .layer(middleware::from_fn(log_requests))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(config))
}

pub async fn serve(host: &str, port: u16, config: ServerConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    log::info!("REST API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(config)).await
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} -> {} ({:?})",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

async fn index() -> Json<Value> {
    Json(json!({
        "name": "Image Convert API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "REST API for converting images to WebP and AVIF formats",
        "endpoints": {
            "GET /": "This documentation",
            "GET /api/tools": "List available tools",
            "POST /api/convert/single": "Convert a single image",
            "POST /api/convert/batch": "Convert multiple images",
        },
    }))
}

async fn list_tools() -> Json<Value> {
    let conversion_parameters = json!({
        "output_dir": "string (optional)",
        "format": "webp|avif|both (optional, default: both)",
        "webp_quality": "integer 1-100 (optional, default: 80)",
        "avif_quality": "integer 1-100 (optional, default: 50)",
        "quality": "integer 1-100 (optional, overrides both qualities)",
        "lossless": "boolean (optional, default: false)",
        "max_width": "integer (optional)",
        "max_height": "integer (optional)",
        "preset": "string (optional)",
    });

    let mut single = conversion_parameters.clone();
    single["input_path"] = json!("string (required)");
    let mut batch = conversion_parameters;
    batch["input_path"] = json!("string (required, directory path)");
    batch["workers"] = json!("integer (optional, 0 or omitted: CPU count)");

    Json(json!({
        "tools": [
            {
                "name": "convert_image_single",
                "description": "Convert a single image to WebP and/or AVIF format",
                "endpoint": "/api/convert/single",
                "method": "POST",
                "parameters": single,
            },
            {
                "name": "convert_image_batch",
                "description": "Convert multiple images in a directory",
                "endpoint": "/api/convert/batch",
                "method": "POST",
                "parameters": batch,
            },
        ],
        "status": "success",
    }))
}

async fn convert_single(State(config): State<Arc<ServerConfig>>, body: Bytes) -> ApiResult {
    let request = parse_request(&body)?;
    let result = config.convert_single(request).await?;
    Ok(Json(json!({ "result": result, "status": "success" })))
}

async fn convert_batch(State(config): State<Arc<ServerConfig>>, body: Bytes) -> ApiResult {
    let request = parse_request(&body)?;
    let results = config.convert_batch(request).await?;
    Ok(Json(json!({ "results": results, "status": "success" })))
}

fn parse_request(body: &[u8]) -> Result<ConversionRequest, ApiError> {
    let params: Value = serde_json::from_slice(body).map_err(|e| {
        ConvertError::InvalidParameter(format!("Request body is not valid JSON: {}", e))
    })?;
    Ok(ConversionRequest::from_params(&params)?)
}
