use std::env;
use std::path::PathBuf;

use anyhow::Result;

pub const DEFAULT_DB_PATH: &str = "./binaried.db";
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_PORT: u16 = 5000;

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
#[derive(Clone)]
pub struct Config {
    pub db_path: String,
    /// HMAC key for auth tokens (BINARIED_SESSION_SECRET env var)
    pub session_secret: String,
    /// Root directory for uploaded images, served at /uploads
    pub upload_dir: PathBuf,
    /// Origin allowed by CORS (the web client)
    pub frontend_url: String,
    /// Listen port when `serve` is given no --port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the session secret, which is only
    /// checked by commands that issue or verify tokens.
    pub fn load() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a number between 1 and 65535, got {raw:?}"))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            db_path: env::var("BINARIED_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()),
            session_secret: env::var("BINARIED_SESSION_SECRET").unwrap_or_default(),
            upload_dir: env::var("BINARIED_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
            port,
        })
    }

    /// Check that the token signing secret is configured.
    /// Call this before serving the API.
    pub fn require_session_secret(&self) -> Result<()> {
        if self.session_secret.is_empty() {
            anyhow::bail!(
                "BINARIED_SESSION_SECRET not set. Add it to your .env file.\n\
                 Any long random string works, e.g. the output of `openssl rand -hex 32`."
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            db_path: DEFAULT_DB_PATH.to_string(),
            session_secret: String::new(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            port: DEFAULT_PORT,
        }
    }

    #[test]
    fn test_missing_secret_is_reported() {
        let config = sample();
        let err = config.require_session_secret().unwrap_err();
        assert!(err.to_string().contains("BINARIED_SESSION_SECRET"));
    }

    #[test]
    fn test_present_secret_passes() {
        let config = Config {
            session_secret: "s3cret".to_string(),
            ..sample()
        };
        assert!(config.require_session_secret().is_ok());
    }
}
