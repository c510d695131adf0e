use axum::{
    body::Bytes,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{decode_data_url, PredictResponse, PREDICT_ROUTE},
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{info, warn};

pub mod config;
pub mod scoring;

use config::Settings;
use scoring::score_image;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub fn build_router(settings: &Settings) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(PREDICT_ROUTE, post(predict))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(settings.max_body_bytes))
        .layer(CorsLayer::permissive())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn predict(body: Bytes) -> ApiResult<Json<PredictResponse>> {
    let Some(image) = image_field(&body) else {
        return Err(validation("No image provided"));
    };

    let bytes = decode_data_url(&image).map_err(|error| {
        warn!(%error, "rejecting undecodable image payload");
        validation(error.to_string())
    })?;

    let score = score_image(&bytes);
    info!(
        size_bytes = bytes.len(),
        label = %score.label,
        confidence = score.confidence,
        "scored image"
    );

    Ok(Json(PredictResponse {
        prediction: score.label.as_str().to_string(),
        confidence: score.confidence,
    }))
}

/// The `image` string of a JSON object body, if there is one.
fn image_field(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("image")? {
        serde_json::Value::String(image) => Some(image.clone()),
        _ => None,
    }
}

fn validation(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new(ErrorCode::Validation, message)),
    )
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
