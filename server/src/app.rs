//! Shared application state for axum handlers.

use std::sync::Arc;

use ab_glyph::FontArc;
use diy_client::DiyClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

struct SharedStateInner {
    config: ServerConfig,
    client: DiyClient,
    font: Option<FontArc>,
    shutdown: CancellationToken,
}

impl SharedState {
    pub fn new(config: ServerConfig) -> Self {
        let client = DiyClient::new(config.upstream_base.clone());
        let font = config.font_path.as_ref().and_then(|path| {
            match std::fs::read(path).map_err(anyhow::Error::from).and_then(|bytes| {
                FontArc::try_from_vec(bytes).map_err(anyhow::Error::from)
            }) {
                Ok(font) => {
                    info!(path = %path.display(), "Loaded annotation font");
                    Some(font)
                }
                Err(e) => {
                    warn!(path = %path.display(), "Failed to load font, text annotations disabled: {e}");
                    None
                }
            }
        });

        Self {
            inner: Arc::new(SharedStateInner {
                config,
                client,
                font,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &DiyClient {
        &self.inner.client
    }

    pub fn font(&self) -> Option<FontArc> {
        self.inner.font.clone()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }
}
