//! Server configuration from environment variables.

use std::path::PathBuf;

/// Default listen port (matches the original backend).
pub const DEFAULT_PORT: u16 = 5969;

/// Default upstream print service.
pub const DEFAULT_UPSTREAM: &str = "https://app-go.heytea.com";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Preferred listen port; the next free port within 100 is used when
    /// this one is taken.
    pub port: u16,
    /// Base URL of the upstream print service.
    pub upstream_base: String,
    /// TTF/OTF font for text annotations. Text layers are rejected when
    /// unset.
    pub font_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from the environment (after `.env`, if present).
    pub fn load() -> anyhow::Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a number, got {raw:?}"))?,
            Err(_) => DEFAULT_PORT,
        };

        let upstream_base = std::env::var("UPSTREAM_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_UPSTREAM.to_string());

        let font_path = std::env::var("FONT_PATH").ok().map(PathBuf::from);

        Ok(Self {
            port,
            upstream_base,
            font_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        // Only assert the constants; the env-reading path depends on the
        // process environment.
        assert_eq!(DEFAULT_PORT, 5969);
        assert!(DEFAULT_UPSTREAM.starts_with("https://"));
    }

    #[test]
    fn config_is_cloneable_for_state() {
        let config = ServerConfig {
            port: 8080,
            upstream_base: DEFAULT_UPSTREAM.into(),
            font_path: None,
        };
        let clone = config.clone();
        assert_eq!(clone.port, 8080);
    }
}
