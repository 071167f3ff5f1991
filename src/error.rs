use crate::priv_prelude::*;

/// Errors returned when starting or reconfiguring a [`DuplexRelay`].
///
/// Once a relay is running, I/O errors on its connections are logged and end the affected
/// direction. They're never returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("no delay distribution set for relay")]
    NoDistribution,

    #[error("invalid relay configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot {op} relay in state {state:?}")]
    InvalidState {
        op: &'static str,
        state: RelayState,
    },

    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    #[error("failed to connect to {addr}: {source}")]
    Dial {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("relay was stopped before it started relaying")]
    Cancelled,
}

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not parse {input:?} into a valid IP address and port")]
    Address { input: String },

    #[error("unknown distribution {0:?}")]
    UnknownDistribution(String),

    #[error("distribution {distribution} requires parameter {param:?}")]
    MissingParam {
        distribution: &'static str,
        param: &'static str,
    },

    #[error("distribution {distribution} has no parameter {param:?}")]
    UnknownParam {
        distribution: &'static str,
        param: String,
    },

    #[error("parameter {param:?} of distribution {distribution} must be a {expected}")]
    ParamType {
        distribution: &'static str,
        param: &'static str,
        expected: ParamKind,
    },

    #[error("{0}")]
    Invalid(String),
}
