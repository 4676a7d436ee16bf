//! Generic JSON proxy to the upstream service.
//!
//! Login and account flows stay unimplemented locally; the frontend sends
//! them through here opaquely.

use axum::Json;
use axum::extract::State;
use diy_client::{ClientError, ProxyRequest};
use serde_json::json;
use tracing::error;

use super::{err_json, ApiResult};
use crate::app::SharedState;

/// POST /api – forward a JSON request to the upstream base URL.
pub async fn proxy_request(
    State(state): State<SharedState>,
    Json(req): Json<ProxyRequest>,
) -> ApiResult {
    match state.client().proxy(req).await {
        Ok(body) => Ok(Json(body)),
        Err(ClientError::InvalidRequest(msg)) => Err(err_json(400, &msg)),
        Err(e) => {
            error!("Proxy request failed: {e}");
            Err((
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Proxy request failed",
                    "message": e.to_string(),
                })),
            ))
        }
    }
}
