//! Command line front end for the `netdelay` binary.

use crate::priv_prelude::*;
use clap::{ArgAction, Parser, Subcommand};

/// netdelay command line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "netdelay", version, about = "TCP relay which adds random latency to forwarded data")]
pub struct Args {
    /// Logging verbosity. Repeat for more output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start a single relay from the command line.
    Proxy(ProxyArgs),
    /// Start every relay listed in a TOML configuration file.
    FromFile {
        /// Path to the configuration file.
        config: PathBuf,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct ProxyArgs {
    /// Read/write chunk size for the relay in bytes.
    #[arg(short, long, default_value_t = RelayConfig::DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Address to accept the inbound connection on.
    #[arg(value_name = "BIND_ADDRESS:BIND_PORT", value_parser = crate::config::parse_addr)]
    pub bind_addr: SocketAddr,

    /// Address of the upstream server.
    #[arg(value_name = "HOST_ADDRESS:HOST_PORT", value_parser = crate::config::parse_addr)]
    pub connect_addr: SocketAddr,

    #[command(subcommand)]
    pub distribution: DistributionArgs,
}

/// Delay distribution selection. Durations are in seconds.
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum DistributionArgs {
    /// Delay every chunk by the same amount.
    Constant {
        #[arg(long, allow_negative_numbers = true)]
        constant: f64,
    },
    /// Normally-distributed delays.
    Gaussian {
        #[arg(long, allow_negative_numbers = true)]
        mean: f64,
        #[arg(long)]
        std_dev: f64,
        /// Clamp negative delays to zero.
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        strictly_positive: bool,
    },
    /// Exponentially-distributed delays.
    Exponential {
        #[arg(long)]
        scale: f64,
    },
}

impl From<DistributionArgs> for Distribution {
    fn from(args: DistributionArgs) -> Distribution {
        match args {
            DistributionArgs::Constant { constant } => Distribution::constant(constant),
            DistributionArgs::Gaussian { mean, std_dev, strictly_positive } => {
                Distribution::Gaussian { mean, std_dev, strictly_positive }
            },
            DistributionArgs::Exponential { scale } => Distribution::exponential(scale),
        }
    }
}

impl ProxyArgs {
    pub fn relay_config(&self) -> Result<RelayConfig, ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk size must be non-zero".to_owned()));
        }
        let config = {
            RelayConfig::new(self.bind_addr, self.connect_addr)
            .chunk_size(self.chunk_size)
            .distribution(self.distribution.into())
        };
        Ok(config)
    }
}

/// Runs the relays described by `args` until interrupted.
pub async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.verbose);

    let configs = match &args.command {
        Command::Proxy(proxy) => vec![proxy.relay_config()?],
        Command::FromFile { config } => FileConfig::load(config)?.relay_configs()?,
    };
    if configs.is_empty() {
        warn!("no relays configured");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    let _detach = tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    run_relays(configs, shutdown).await?;
    Ok(())
}

/// Starts all the relays concurrently and runs them until `shutdown` is cancelled or every relay
/// has finished on its own. All relays are stopped before this returns. If any relay fails to
/// start, the others are stopped and the error is returned.
pub async fn run_relays(
    configs: Vec<RelayConfig>,
    shutdown: CancellationToken,
) -> Result<(), RelayError> {
    let mut relays: Vec<DuplexRelay> = configs.into_iter().map(DuplexRelay::new).collect();

    let start_res_opt = {
        let start_all = future::try_join_all(relays.iter_mut().map(DuplexRelay::start));
        tokio::select! {
            start_res = start_all => Some(start_res),
            () = shutdown.cancelled() => None,
        }
    };
    let res = match start_res_opt {
        Some(Ok(_)) => {
            info!("started {} relay(s)", relays.len());
            let wait_all = future::join_all(relays.iter_mut().map(DuplexRelay::wait));
            tokio::select! {
                _ = wait_all => info!("all relays finished"),
                () = shutdown.cancelled() => (),
            }
            Ok(())
        },
        Some(Err(err)) => Err(err),
        None => Ok(()),
    };

    info!("shutting down");
    let _ = future::join_all(relays.iter_mut().map(DuplexRelay::stop)).await;
    res
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let _ = {
        env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init()
    };
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", err);
            future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(err) => {
                warn!("failed to listen for SIGTERM: {}", err);
                future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        () = ctrl_c => (),
        () = terminate => (),
    }
}
