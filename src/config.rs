//! Relay configuration, either built in code or loaded from a TOML file.
//!
//! A configuration file lists any number of relays:
//!
//! ```toml
//! [[proxies]]
//! bind_addr = "127.0.0.1:5000"
//! connect_addr = "127.0.0.1:5001"
//! chunk_size = 4096
//!
//! [proxies.distribution]
//! name = "exponential"
//! params = { scale = 0.02 }
//! ```

use crate::priv_prelude::*;

/// Parameters for a single [`DuplexRelay`].
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Address to accept the inbound connection on.
    pub listen_addr: SocketAddr,
    /// Upstream address to dial once a connection has been accepted.
    pub connect_addr: SocketAddr,
    /// Maximum number of bytes forwarded per read/write.
    pub chunk_size: usize,
    /// Delay distribution. Must be set before the relay is started.
    pub distribution: Option<Distribution>,
    /// How long [`DuplexRelay::stop`] waits for the forwarding tasks to finish.
    pub shutdown_timeout: Duration,
    /// Stop both directions as soon as either one fails with an I/O error.
    pub fail_fast: bool,
}

impl RelayConfig {
    pub const DEFAULT_CHUNK_SIZE: usize = 4096;
    pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

    /// Creates a config with default chunk size and shutdown timeout and no distribution.
    pub fn new(listen_addr: SocketAddr, connect_addr: SocketAddr) -> RelayConfig {
        RelayConfig {
            listen_addr,
            connect_addr,
            chunk_size: RelayConfig::DEFAULT_CHUNK_SIZE,
            distribution: None,
            shutdown_timeout: RelayConfig::DEFAULT_SHUTDOWN_TIMEOUT,
            fail_fast: false,
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> RelayConfig {
        self.chunk_size = chunk_size;
        self
    }

    pub fn distribution(mut self, distribution: Distribution) -> RelayConfig {
        self.distribution = Some(distribution);
        self
    }

    pub fn shutdown_timeout(mut self, shutdown_timeout: Duration) -> RelayConfig {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> RelayConfig {
        self.fail_fast = fail_fast;
        self
    }
}

/// The contents of a configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub proxies: Vec<ProxyConfig>,
}

/// One `[[proxies]]` entry of a configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    pub bind_addr: String,
    pub connect_addr: String,
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub fail_fast: bool,
    /// Shutdown timeout in seconds.
    pub shutdown_timeout: Option<f64>,
    pub distribution: DistributionConfig,
}

/// Selects a registered distribution by name. See [`crate::registry`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistributionConfig {
    pub name: String,
    #[serde(default)]
    pub params: Params,
}

impl FileConfig {
    /// Reads and parses a configuration file.
    pub fn load(path: &Path) -> Result<FileConfig, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    source,
                });
            },
        };
        FileConfig::parse(&text)
    }

    pub fn parse(text: &str) -> Result<FileConfig, ConfigError> {
        let config = toml::from_str(text)?;
        Ok(config)
    }

    /// Validates every entry and converts it into a [`RelayConfig`].
    pub fn relay_configs(&self) -> Result<Vec<RelayConfig>, ConfigError> {
        self.proxies.iter().map(ProxyConfig::to_relay_config).collect()
    }
}

impl ProxyConfig {
    pub fn to_relay_config(&self) -> Result<RelayConfig, ConfigError> {
        let listen_addr = parse_addr(&self.bind_addr)?;
        let connect_addr = parse_addr(&self.connect_addr)?;
        let distribution = Distribution::from_params(
            &self.distribution.name,
            &self.distribution.params,
        )?;
        let mut config = {
            RelayConfig::new(listen_addr, connect_addr)
            .distribution(distribution)
            .fail_fast(self.fail_fast)
        };
        if let Some(chunk_size) = self.chunk_size {
            if chunk_size == 0 {
                let msg = format!("{}: chunk_size must be non-zero", self.bind_addr);
                return Err(ConfigError::Invalid(msg));
            }
            config = config.chunk_size(chunk_size);
        }
        if let Some(secs) = self.shutdown_timeout {
            match Duration::try_from_secs_f64(secs) {
                Ok(timeout) => config = config.shutdown_timeout(timeout),
                Err(_) => {
                    let msg = format!("{}: invalid shutdown_timeout {}", self.bind_addr, secs);
                    return Err(ConfigError::Invalid(msg));
                },
            }
        }
        Ok(config)
    }
}

/// Parses an `ip:port` pair. IPv6 addresses must be bracketed, eg. `[::1]:5000`. Hostnames are
/// not resolved.
pub fn parse_addr(input: &str) -> Result<SocketAddr, ConfigError> {
    match input.trim().parse() {
        Ok(addr) => Ok(addr),
        Err(_) => Err(ConfigError::Address { input: input.to_owned() }),
    }
}
