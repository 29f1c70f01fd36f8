//! Process configuration.
//!
//! [`Config`] is built once at startup, from an optional TOML file and then
//! environment overrides, and shared by reference afterwards. Request
//! handling code never reads the process environment.
//!
//! # Example configuration file
//!
//! ```toml
//! [server]
//! http_port = 8080
//! rpc_port = 8081
//! request_timeout_ms = 30000
//!
//! [performer]
//! worker = "hex-square"
//!
//! [executor]
//! operator_address = "0x1111111111111111111111111111111111111111"
//! aggregator_url = "http://localhost:9000"
//!
//! [contracts]
//! task_mailbox = "0x2222222222222222222222222222222222222222"
//! ```

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::worker::WorkerKind;

/// Prefix shared by every environment variable the runtime reads.
pub const ENV_PREFIX: &str = "HOURGLASS_";

/// Prefix of contract address variables, e.g. `HOURGLASS_CONTRACT_TASK_MAILBOX`.
pub const CONTRACT_ENV_PREFIX: &str = "HOURGLASS_CONTRACT_";

static HEX_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static regex is valid"));

/// Whether `value` looks like a 20-byte hex address.
///
/// ```
/// use hourglass::config::is_hex_address;
///
/// assert!(is_hex_address("0x5FbDB2315678afecb367f032d93F642f64180aa3"));
/// assert!(!is_hex_address("0x1234"));
/// ```
pub fn is_hex_address(value: &str) -> bool {
    HEX_ADDRESS.is_match(value)
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener settings.
    pub server: ServerConfig,
    /// Performer role settings.
    pub performer: PerformerConfig,
    /// Executor role settings.
    pub executor: ExecutorConfig,
    /// Named contract addresses.
    pub contracts: BTreeMap<String, String>,
}

/// Listener and shutdown settings shared by every role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: IpAddr,
    /// HTTP transport port; 0 picks an ephemeral port.
    pub http_port: u16,
    /// RPC transport port; 0 picks an ephemeral port.
    pub rpc_port: u16,
    /// Per-request timeout applied by the transports.
    pub request_timeout_ms: u64,
    /// Grace period for in-flight requests on shutdown.
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: 8080,
            rpc_port: 8081,
            request_timeout_ms: 30_000,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl ServerConfig {
    /// Settings for tests: loopback, ephemeral ports, short timeouts.
    pub fn ephemeral() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            http_port: 0,
            rpc_port: 0,
            request_timeout_ms: 5_000,
            shutdown_grace_ms: 1_000,
        }
    }

    /// HTTP listen address.
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.http_port)
    }

    /// RPC listen address.
    pub fn rpc_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.rpc_port)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Shutdown grace period as a duration.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Performer role settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformerConfig {
    /// Which built-in worker to bind.
    pub worker: WorkerKind,
    /// Artificial per-task delay in milliseconds; 0 disables it.
    pub delay_ms: u64,
}

impl PerformerConfig {
    /// The artificial delay, if any.
    pub fn delay(&self) -> Option<Duration> {
        (self.delay_ms > 0).then(|| Duration::from_millis(self.delay_ms))
    }
}

/// Executor role settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Address this executor signs results as.
    pub operator_address: Option<String>,
    /// Base URL of the aggregator's RPC endpoint.
    pub aggregator_url: Option<String>,
    /// Deliver results in the background instead of inline.
    pub detached_delivery: bool,
}

impl ExecutorConfig {
    /// The operator address, required for the executor role.
    pub fn operator_address(&self) -> Result<&str, ConfigError> {
        self.operator_address
            .as_deref()
            .ok_or(ConfigError::Missing("executor.operator_address"))
    }

    /// The parsed aggregator URL, required for the executor role.
    pub fn aggregator_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .aggregator_url
            .as_deref()
            .ok_or(ConfigError::Missing("executor.aggregator_url"))?;
        Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
            key: "executor.aggregator_url".to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Config {
    /// Parses a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env(std::env::vars())
    }

    /// Applies `HOURGLASS_*` overrides from `vars`.
    ///
    /// Taking the variables as an iterator keeps this testable without
    /// touching the real environment.
    pub fn with_env<I, K, V>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if let Some(contract) = key.strip_prefix(CONTRACT_ENV_PREFIX) {
                if !is_hex_address(value) {
                    return Err(ConfigError::InvalidAddress {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
                self.contracts
                    .insert(contract.to_ascii_lowercase(), value.to_string());
                continue;
            }
            match name {
                "HOST" => self.server.host = parse(key, value)?,
                "HTTP_PORT" => self.server.http_port = parse(key, value)?,
                "RPC_PORT" => self.server.rpc_port = parse(key, value)?,
                "REQUEST_TIMEOUT_MS" => self.server.request_timeout_ms = parse(key, value)?,
                "SHUTDOWN_GRACE_MS" => self.server.shutdown_grace_ms = parse(key, value)?,
                "WORKER" => self.performer.worker = parse(key, value)?,
                "WORKER_DELAY_MS" => self.performer.delay_ms = parse(key, value)?,
                "OPERATOR_ADDRESS" => self.executor.operator_address = Some(value.to_string()),
                "AGGREGATOR_URL" => self.executor.aggregator_url = Some(value.to_string()),
                "DETACHED_DELIVERY" => self.executor.detached_delivery = parse(key, value)?,
                _ => {},
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Looks up a contract address by name (case-insensitive).
    pub fn contract(&self, name: &str) -> Option<&str> {
        self.contracts
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, address) in &self.contracts {
            if !is_hex_address(address) {
                return Err(ConfigError::InvalidAddress {
                    key: format!("contracts.{name}"),
                    value: address.clone(),
                });
            }
        }
        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "server.request_timeout_ms".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ADDR: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.server.rpc_port, 8081);
        assert_eq!(config.server.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.performer.worker, WorkerKind::Square);
        assert!(config.performer.delay().is_none());
    }

    #[test]
    fn env_overrides() {
        let config = Config::default()
            .with_env([
                ("HOURGLASS_HTTP_PORT", "9090"),
                ("HOURGLASS_WORKER", "greeting"),
                ("HOURGLASS_WORKER_DELAY_MS", "250"),
                ("HOURGLASS_DETACHED_DELIVERY", "true"),
                ("HOURGLASS_CONTRACT_TASK_MAILBOX", ADDR),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();
        assert_eq!(config.server.http_port, 9090);
        assert_eq!(config.performer.worker, WorkerKind::Greeting);
        assert_eq!(config.performer.delay(), Some(Duration::from_millis(250)));
        assert!(config.executor.detached_delivery);
        assert_eq!(config.contract("TASK_MAILBOX"), Some(ADDR));
    }

    #[test]
    fn rejects_non_address_contract_values() {
        let err = Config::default()
            .with_env([("HOURGLASS_CONTRACT_MAILBOX", "not-an-address")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress { .. }));
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = Config::default()
            .with_env([("HOURGLASS_RPC_PORT", "eighty")])
            .unwrap_err();
        assert!(err.to_string().contains("HOURGLASS_RPC_PORT"), "{err}");
    }

    #[test]
    fn parses_toml() {
        let config = Config::from_toml(&format!(
            r#"
            [server]
            http_port = 1234

            [performer]
            worker = "hex-square"

            [executor]
            operator_address = "{ADDR}"
            aggregator_url = "http://localhost:9000"

            [contracts]
            mailbox = "{ADDR}"
            "#
        ))
        .unwrap();
        assert_eq!(config.server.http_port, 1234);
        assert_eq!(config.server.rpc_port, 8081);
        assert_eq!(config.performer.worker, WorkerKind::HexSquare);
        assert_eq!(config.executor.operator_address().unwrap(), ADDR);
        assert_eq!(
            config.executor.aggregator_url().unwrap().as_str(),
            "http://localhost:9000/"
        );
        assert_eq!(config.contract("mailbox"), Some(ADDR));
    }

    #[test]
    fn executor_settings_are_required_on_demand() {
        let config = Config::default();
        assert!(matches!(
            config.executor.operator_address(),
            Err(ConfigError::Missing(_))
        ));
        assert!(matches!(
            config.executor.aggregator_url(),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hourglass.toml");
        std::fs::write(&path, "[server]\nrpc_port = 7000\n").unwrap();
        assert_eq!(Config::from_file(&path).unwrap().server.rpc_port, 7000);
        assert!(matches!(
            Config::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
