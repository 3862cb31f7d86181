use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub origin_url: String,
    pub upstream_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let origin_url = env::var("ORIGIN_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string())
            .trim_end_matches('/')
            .to_string();

        let upstream_timeout_secs = env::var("UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            port,
            origin_url,
            upstream_timeout: Duration::from_secs(upstream_timeout_secs),
        })
    }

    /// WebSocket address of the origin chat gateway, with the validated
    /// credential propagated as a query parameter.
    pub fn origin_ws_url(&self, peer_id: &str, token: &str) -> String {
        let base = self
            .origin_url
            .replacen("http://", "ws://", 1)
            .replacen("https://", "wss://", 1);
        format!("{base}/chat/ws/{peer_id}?token={token}")
    }

    pub fn origin_messages_url(&self, peer_id: &str) -> String {
        format!("{}/chat/messages/{}", self.origin_url, peer_id)
    }
}
