//! A TCP relay for testing applications under bad network conditions.
//!
//! A [`DuplexRelay`] sits between a client and a server. It accepts a single connection from the
//! client, connects to the server and forwards data in both directions, delaying every chunk it
//! forwards by a random duration drawn from a [`Distribution`]. The data itself is passed through
//! untouched.
//!
//! ```no_run
//! use netdelay::{Distribution, DuplexRelay, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = {
//!         RelayConfig::new("127.0.0.1:5000".parse().unwrap(), "127.0.0.1:5001".parse().unwrap())
//!         .chunk_size(512)
//!         .distribution(Distribution::exponential(0.02))
//!     };
//!     let mut relay = DuplexRelay::new(config);
//!
//!     // Blocks until a client connects to 127.0.0.1:5000.
//!     relay.start().await.unwrap();
//!
//!     tokio::signal::ctrl_c().await.unwrap();
//!     relay.stop().await;
//! }
//! ```
//!
//! Each direction is driven by a [`SimplexRelay`], which can also be used on its own to delay
//! data flowing between any `AsyncRead` and `AsyncWrite`.
//!
//! Distributions can be selected by name, with their parameters given as a table, through the
//! [`registry`] module. This is what the `netdelay` binary uses to load relays from a TOML file
//! (see [`config`]).

mod priv_prelude;
mod util;
mod net;
mod error;
mod distribution;
mod simplex;
mod duplex;
pub mod registry;
pub mod config;
pub mod cli;
#[cfg(test)]
mod tests;

pub use crate::{
    config::{FileConfig, RelayConfig, parse_addr},
    distribution::Distribution,
    duplex::{DuplexRelay, RelayState, StopHandle},
    error::{ConfigError, RelayError},
    simplex::{SimplexEnd, SimplexRelay, SimplexReport},
};
