//! Artwork upload endpoint: runs the full pipeline and forwards the
//! prepared artifact upstream.

use axum::Json;
use axum::extract::{Multipart, State};
use diy_client::UploadRequest;
use print_pipeline::prepare::SignatureProvider;
use print_pipeline::{
    crop, to_grayscale, AnnotationDocument, AnnotationLayer, PipelineError, RasterBuffer, RectF,
    UploadPreparer, TARGET_HEIGHT, TARGET_WIDTH,
};
use serde_json::json;
use tracing::{error, info};

use super::{err_json, pipeline_err, ApiResult};
use crate::app::SharedState;

/// Raw multipart fields of one upload request.
#[derive(Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    crop_area: Option<String>,
    sign: Option<String>,
    user_id: Option<String>,
    timestamp_ms: Option<i64>,
    token: Option<String>,
    annotations: Option<String>,
}

/// The signature arrives resolved (passed through or precomputed); the
/// preparer treats it as opaque.
struct ProvidedSignature(String);

impl SignatureProvider for ProvidedSignature {
    fn sign(&self, _user_id: &str, _timestamp_ms: i64) -> String {
        self.0.clone()
    }
}

/// POST /upload – multipart: `file` + `cropArea` (source-space JSON rect),
/// auth fields (`sign` or `userId`, `t`, `token`), optional `annotations`
/// (JSON array of stroke/text layers).
pub async fn upload_artwork(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> ApiResult {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| err_json(400, &e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| err_json(400, &e.to_string()))?;
                form.file = Some(data.to_vec());
            }
            "cropArea" => form.crop_area = field.text().await.ok(),
            "sign" => form.sign = field.text().await.ok(),
            "userId" => form.user_id = field.text().await.ok(),
            "t" => {
                form.timestamp_ms = field.text().await.ok().and_then(|raw| raw.parse().ok());
            }
            "token" => form.token = field.text().await.ok(),
            "annotations" => form.annotations = field.text().await.ok(),
            // width/height are declared by the client but derived from the
            // prepared artifact here.
            _ => {}
        }
    }

    let file = form
        .file
        .ok_or_else(|| err_json(400, "Missing required parameter: file"))?;
    let crop_area: RectF = form
        .crop_area
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| err_json(400, &format!("Bad cropArea: {e}")))?
        .ok_or_else(|| err_json(400, "Missing required parameter: cropArea"))?;
    let annotations: Vec<AnnotationLayer> = match form.annotations.as_deref() {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| err_json(400, &format!("Bad annotations: {e}")))?,
        None => Vec::new(),
    };
    let token = form
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| err_json(400, "Missing required parameter: token"))?;

    let timestamp_ms = form
        .timestamp_ms
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
    let user_id = form.user_id.unwrap_or_default();
    let sign = match form.sign.filter(|s| !s.is_empty()) {
        Some(sign) => sign,
        None if !user_id.is_empty() => diy_client::upload_sign(&user_id, timestamp_ms),
        None => return Err(err_json(400, "Missing required parameter: sign or userId")),
    };

    // The encode loop re-encodes a ~0.5 MP raster up to 20 times; keep it
    // off the request thread and abandon it cooperatively on shutdown.
    let cancel = state.shutdown_token().child_token();
    let font = state.font();
    let prepared = tokio::task::spawn_blocking(move || {
        let source = RasterBuffer::decode(&file)?;
        let source = to_grayscale(source)?;
        let (source_w, source_h) = source.dimensions();

        let region = crop::resolve_crop(crop_area, 1.0, 1.0, source_w, source_h)?;
        let background = crop::render(&source, &region, TARGET_WIDTH, TARGET_HEIGHT)?;

        let mut document = AnnotationDocument::new(background)?;
        if let Some(font) = font {
            document = document.with_font(font);
        }
        for layer in annotations {
            document.apply(layer)?;
        }

        UploadPreparer::default().prepare(
            &document,
            &ProvidedSignature(sign),
            &user_id,
            timestamp_ms,
            Some(&cancel),
        )
    })
    .await
    .map_err(|e| err_json(500, &format!("Pipeline task failed: {e}")))?
    .map_err(|e: PipelineError| pipeline_err(&e))?;

    info!(
        filename = %prepared.filename(),
        size_kb = prepared.artifact.size_bytes() / 1024,
        attempts = prepared.attempts,
        window_met = prepared.window_met,
        "Pipeline finished, forwarding upstream"
    );

    let size_bytes = prepared.artifact.size_bytes();
    let request = UploadRequest {
        filename: prepared.filename(),
        content_type: prepared.artifact.format.mime().to_string(),
        bytes: prepared.artifact.bytes,
        width: prepared.width,
        height: prepared.height,
        sign: prepared.sign,
        timestamp_ms: prepared.timestamp_ms,
        token,
    };

    match state.client().upload_artwork(request).await {
        Ok(response) => Ok(Json(json!({
            "code": response.code,
            "message": response.message,
            "data": response.data,
            "sizeKB": size_bytes / 1024,
            "attempts": prepared.attempts,
            "windowMet": prepared.window_met,
        }))),
        Err(e) => {
            error!("Upstream upload failed: {e}");
            Err(err_json(502, &format!("Upload failed: {e}")))
        }
    }
}
