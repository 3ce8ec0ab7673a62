use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::InvalidTransport(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: Transport,
    pub api_token: Option<String>,
    pub bind_addr: String,
    pub bind_port: u16,
    pub root_dir: PathBuf,
    pub server_name: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MCP_TRANSPORT must be `stdio` or `http`, got `{0}`")]
    InvalidTransport(String),
    #[error("MCP_API_TOKEN is required for the http transport and must not be empty")]
    MissingApiToken,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let transport = non_empty("MCP_TRANSPORT")
            .map(|value| value.parse::<Transport>())
            .transpose()?
            .unwrap_or(Transport::Stdio);

        let api_token = non_empty("MCP_API_TOKEN");
        if transport == Transport::Http && api_token.is_none() {
            return Err(ConfigError::MissingApiToken);
        }

        let bind_addr = non_empty("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());
        let bind_port = non_empty("BIND_PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);
        let root_dir = non_empty("MCP_ROOT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let server_name =
            non_empty("MCP_SERVER_NAME").unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());

        let config = Self {
            transport,
            api_token,
            bind_addr,
            bind_port,
            root_dir,
            server_name,
        };

        if config.transport == Transport::Http {
            config.bind_socket()?;
        }
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn parse_defaults() {
        let config = Config::from_lookup(lookup(&[])).expect("config should parse");
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.api_token, None);
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.bind_port, 8080);
        assert_eq!(config.root_dir, PathBuf::from("."));
        assert_eq!(config.server_name, "mcp-toolbox");
    }

    #[test]
    fn http_requires_token() {
        let err = Config::from_lookup(lookup(&[("MCP_TRANSPORT", "http")]))
            .expect_err("expected missing token error");
        assert!(matches!(err, ConfigError::MissingApiToken));
    }

    #[test]
    fn http_with_token_parses() {
        let config = Config::from_lookup(lookup(&[
            ("MCP_TRANSPORT", "HTTP"),
            ("MCP_API_TOKEN", " abc "),
            ("BIND_PORT", "9000"),
        ]))
        .expect("config should parse");
        assert_eq!(config.transport, Transport::Http);
        assert_eq!(config.api_token.as_deref(), Some("abc"));
        assert_eq!(
            config.bind_socket().expect("socket"),
            "127.0.0.1:9000".parse().expect("addr")
        );
    }

    #[test]
    fn invalid_port_fails() {
        let err = Config::from_lookup(lookup(&[("BIND_PORT", "99999")]))
            .expect_err("expected invalid port");
        assert!(matches!(err, ConfigError::InvalidPort));
    }

    #[test]
    fn unknown_transport_fails() {
        let err = Config::from_lookup(lookup(&[("MCP_TRANSPORT", "carrier-pigeon")]))
            .expect_err("expected invalid transport");
        assert!(matches!(err, ConfigError::InvalidTransport(value) if value == "carrier-pigeon"));
    }

    #[test]
    fn invalid_bind_address_fails_for_http() {
        let err = Config::from_lookup(lookup(&[
            ("MCP_TRANSPORT", "http"),
            ("MCP_API_TOKEN", "abc"),
            ("BIND_ADDR", "not an address"),
        ]))
        .expect_err("expected invalid socket");
        assert!(matches!(err, ConfigError::InvalidSocket));
    }
}
