//! Configuration (env vars, bind address). Grounded in the teacher's
//! `game/backend/src/config.rs` "env var, else sensible default" style,
//! generalized to the closed env-var set from spec.md §6.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};

/// Everything the process needs, read once at startup and carried
/// explicitly in `AppState` rather than touched again at call sites.
#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    pub app_secret: Vec<u8>,
    pub bind_addr: SocketAddr,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let bot_token = env::var("BOT_TOKEN").map_err(|_| ConfigError::Missing("BOT_TOKEN"))?;
        let app_secret = env::var("APP_SECRET").map_err(|_| ConfigError::Missing("APP_SECRET"))?.into_bytes();
        let port = env::var("PORT").ok().and_then(|v| v.parse::<u16>().ok()).unwrap_or(8080);
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        Ok(Config { bot_token, app_secret, bind_addr })
    }
}
