//! HTTP transport to the upstream DIY print API.

use std::collections::HashMap;

use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{ClientError, Result};

/// Upload endpoint path on the upstream service.
const UPLOAD_PATH: &str = "/api/service-cps/user/diy";

/// Envelope every upstream endpoint responds with. `code == 0` means the
/// request was accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn is_accepted(&self) -> bool {
        self.code == 0
    }
}

/// A generic request forwarded through the JSON proxy endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRequest {
    /// Path on the upstream service, e.g. `/api/service-member/vip/user/info`.
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub param: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
}

fn default_method() -> String {
    "POST".to_string()
}

/// One artwork upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub sign: String,
    pub timestamp_ms: i64,
    /// Raw bearer token; normalized into the Authorization header.
    pub token: String,
}

/// Client for the upstream print service.
#[derive(Debug, Clone)]
pub struct DiyClient {
    http: reqwest::Client,
    base_url: String,
}

impl DiyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forward an arbitrary JSON request to the upstream service and return
    /// the response body verbatim.
    pub async fn proxy(&self, req: ProxyRequest) -> Result<Value> {
        if !req.url.starts_with('/') {
            return Err(ClientError::InvalidRequest(format!(
                "proxy url must be a path, got {:?}",
                req.url
            )));
        }
        let url = format!("{}{}", self.base_url, req.url);
        let method: reqwest::Method = req
            .method
            .to_uppercase()
            .parse()
            .map_err(|_| ClientError::InvalidRequest(format!("bad method {:?}", req.method)))?;
        debug!(%url, method = %method, "Proxying request upstream");

        let mut builder = self.http.request(method, &url).query(&req.param);
        for (name, value) in &req.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::ApiError {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(resp.json().await?)
    }

    /// Upload one artwork as multipart form data.
    ///
    /// The signature and timestamp ride as query parameters; the file part
    /// carries the timestamped filename and declared MIME type; `width` and
    /// `height` are plain text fields.
    pub async fn upload_artwork(&self, req: UploadRequest) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, UPLOAD_PATH);
        let authorization = crate::token::bearer_header(&req.token);
        if authorization.is_empty() {
            return Err(ClientError::InvalidRequest("missing bearer token".into()));
        }

        let file_part = Part::bytes(req.bytes)
            .file_name(req.filename.clone())
            .mime_str(&req.content_type)
            .map_err(|_| {
                ClientError::InvalidRequest(format!("bad content type {:?}", req.content_type))
            })?;
        let form = Form::new()
            .part("file", file_part)
            .text("width", req.width.to_string())
            .text("height", req.height.to_string());

        info!(
            filename = %req.filename,
            width = req.width,
            height = req.height,
            "Uploading artwork upstream"
        );

        let t = req.timestamp_ms.to_string();
        let resp = self
            .http
            .post(&url)
            .query(&[("sign", req.sign.as_str()), ("t", t.as_str())])
            .header(AUTHORIZATION, authorization)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::ApiError {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }

        let body: ApiResponse = resp.json().await?;
        info!(code = body.code, "Upstream upload response");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = DiyClient::new("https://example.com/");
        assert_eq!(client.base_url(), "https://example.com");
    }

    #[test]
    fn api_response_accepts_code_zero_only() {
        let ok: ApiResponse = serde_json::from_str(r#"{"code":0,"data":{"url":"x"}}"#).unwrap();
        assert!(ok.is_accepted());

        let rejected: ApiResponse =
            serde_json::from_str(r#"{"code":-1,"message":"bad sign"}"#).unwrap();
        assert!(!rejected.is_accepted());
        assert_eq!(rejected.message.as_deref(), Some("bad sign"));
    }

    #[test]
    fn proxy_request_defaults() {
        let req: ProxyRequest = serde_json::from_str(r#"{"url":"/api/x"}"#).unwrap();
        assert_eq!(req.method, "POST");
        assert!(req.headers.is_empty());
        assert!(req.param.is_empty());
        assert!(req.body.is_none());
    }

    #[tokio::test]
    async fn proxy_rejects_absolute_urls() {
        let client = DiyClient::new("https://example.com");
        let err = client
            .proxy(ProxyRequest {
                url: "https://elsewhere.test/x".into(),
                method: "POST".into(),
                headers: HashMap::new(),
                param: HashMap::new(),
                body: None,
            })
            .await;
        assert!(matches!(err, Err(ClientError::InvalidRequest(_))));
    }
}
