//! REST API handlers.

pub mod proxy;
pub mod upload;

use axum::Json;
use axum::http::StatusCode;
use print_pipeline::PipelineError;
use serde_json::{json, Value};

pub type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Standard error response.
pub fn err_json(status: u16, message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(json!({ "code": -1, "message": message })),
    )
}

/// Map pipeline failures onto HTTP statuses.
pub fn pipeline_err(e: &PipelineError) -> (StatusCode, Json<Value>) {
    let status = match e {
        PipelineError::InvalidImageData(_)
        | PipelineError::CropOutOfBounds(_)
        | PipelineError::FontUnavailable => 400,
        PipelineError::EncodeUnavailable(_) => 503,
        PipelineError::Cancelled => 503,
    };
    err_json(status, &e.to_string())
}
