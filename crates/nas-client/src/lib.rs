//! WebSocket JSON-RPC client for the appliance middleware.
//!
//! [`connect`] dials, authenticates and hands back a [`Services`] bundle
//! whose every domain shares the one socket.

mod rpc;
mod services;
mod wire;

pub use rpc::RpcClient;
pub use services::ApplianceApi;

use nas_core::{ApiError, Services};
use std::time::Duration;
use url::Url;

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const API_PATH: &str = "/api/current";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub api_key: String,
    pub tls: bool,
    pub insecure_skip_verify: bool,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            api_key: api_key.into(),
            tls: true,
            insecure_skip_verify: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn endpoint(&self) -> Result<Url, ApiError> {
        let scheme = if self.tls { "wss" } else { "ws" };
        let raw = format!("{scheme}://{}:{}{API_PATH}", self.host, self.port);
        Url::parse(&raw).map_err(|err| ApiError::Transport(format!("invalid endpoint {raw}: {err}")))
    }
}

/// Dials the appliance and returns the service bundle on success.
pub async fn connect(config: &ClientConfig) -> Result<Services, ApiError> {
    let client = RpcClient::connect(config).await?;
    Ok(ApplianceApi::new(client).services())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_uses_secure_scheme_by_default() {
        let config = ClientConfig::new("nas.lan", "admin", "key");
        assert_eq!(
            config.endpoint().expect("url").as_str(),
            "wss://nas.lan/api/current"
        );
    }

    #[test]
    fn endpoint_honours_plain_transport_and_port() {
        let config = ClientConfig {
            tls: false,
            port: 8080,
            ..ClientConfig::new("10.0.0.5", "admin", "key")
        };
        assert_eq!(
            config.endpoint().expect("url").as_str(),
            "ws://10.0.0.5:8080/api/current"
        );
    }

    #[test]
    fn endpoint_rejects_garbage_host() {
        let config = ClientConfig::new("bad host", "admin", "key");
        assert!(matches!(config.endpoint(), Err(ApiError::Transport(_))));
    }
}
