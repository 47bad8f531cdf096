use nas_client::{ClientConfig, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "nas-dash";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config has no servers defined")]
    NoServers,
    #[error("server {0:?} not found in config")]
    UnknownServer(String),
    #[error("multiple servers configured, pick one with --server (available: {})", .0.join(", "))]
    AmbiguousServer(Vec<String>),
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_stale_ttl_secs() -> u64 {
    30
}

fn default_retry_base_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub api_key: String,
    #[serde(default)]
    pub insecure_skip_verify: bool,
    #[serde(default = "default_true")]
    pub tls: bool,
}

impl ServerConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            api_key: self.api_key.clone(),
            tls: self.tls,
            insecure_skip_verify: self.insecure_skip_verify,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_stale_ttl_secs")]
    pub stale_ttl_secs: u64,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(CONFIG_FILE)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        if config.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        Ok(config)
    }

    /// Sorted profile names.
    pub fn server_names(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }

    /// An explicit name wins; otherwise a lone profile is picked.
    pub fn select_server(&self, requested: Option<&str>) -> Result<(String, &ServerConfig), ConfigError> {
        let name = match requested.filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None if self.servers.len() == 1 => self.server_names().remove(0),
            None => return Err(ConfigError::AmbiguousServer(self.server_names())),
        };
        match self.servers.get(&name) {
            Some(server) => Ok((name, server)),
            None => Err(ConfigError::UnknownServer(name)),
        }
    }

    pub fn stale_ttl(&self) -> Duration {
        Duration::from_secs(self.stale_ttl_secs)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TWO_SERVERS: &str = r#"
        stale_ttl_secs = 10

        [servers.lab]
        host = "10.0.0.5"
        username = "admin"
        api_key = "1-abc"
        tls = false
        port = 80

        [servers.prod]
        host = "nas.example.com"
        username = "root"
        api_key = "2-def"
        insecure_skip_verify = true
    "#;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config = Config::parse(TWO_SERVERS).expect("parse");
        assert_eq!(config.stale_ttl(), Duration::from_secs(10));
        assert_eq!(config.retry_base(), Duration::from_secs(1));
        let prod = &config.servers["prod"];
        assert_eq!(prod.port, 443);
        assert!(prod.tls);
        assert!(prod.insecure_skip_verify);
        assert!(!config.servers["lab"].tls);
    }

    #[test]
    fn empty_server_table_is_rejected() {
        let err = Config::parse("stale_ttl_secs = 5").expect_err("no servers");
        assert!(matches!(err, ConfigError::NoServers));
    }

    #[test]
    fn selection_requires_name_when_ambiguous() {
        let config = Config::parse(TWO_SERVERS).expect("parse");
        match config.select_server(None) {
            Err(ConfigError::AmbiguousServer(names)) => assert_eq!(names, ["lab", "prod"]),
            other => panic!("unexpected {other:?}"),
        }
        let (name, server) = config.select_server(Some("prod")).expect("prod");
        assert_eq!(name, "prod");
        assert_eq!(server.username, "root");
        assert!(matches!(
            config.select_server(Some("staging")),
            Err(ConfigError::UnknownServer(_))
        ));
    }

    #[test]
    fn lone_server_is_picked_automatically() {
        let config = Config::parse(
            r#"
            [servers.only]
            host = "nas"
            username = "admin"
            api_key = "k"
            "#,
        )
        .expect("parse");
        let (name, server) = config.select_server(None).expect("auto");
        assert_eq!(name, "only");
        assert_eq!(
            server.client_config().endpoint().expect("url").as_str(),
            "wss://nas/api/current"
        );
    }

    #[test]
    fn load_reports_path_on_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "servers = [").expect("write");
        let err = Config::load(file.path()).expect_err("bad toml");
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, file.path()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load(&dir.path().join("absent.toml")).expect_err("missing");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
