use crate::priv_prelude::*;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

type Report = SimplexReport<OwnedReadHalf, OwnedWriteHalf>;

/// Lifecycle of a [`DuplexRelay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Created, nothing bound yet.
    Configured,
    /// Bound to the listen address, waiting for the inbound connection.
    Listening,
    /// Both connections are established.
    Connected,
    /// Both directions are being forwarded.
    Relaying,
    /// [`DuplexRelay::stop`] is in progress.
    Stopping,
    /// Stopped, or failed to start. A stopped relay can't be restarted.
    Stopped,
}

/// Cancels a [`DuplexRelay`] without needing access to the relay itself.
///
/// Stopping through a handle interrupts a pending [`start`](DuplexRelay::start) and ends both
/// forwarding directions. It doesn't close any sockets, call [`DuplexRelay::stop`] for that.
#[derive(Debug, Clone)]
pub struct StopHandle {
    shutdown: CancellationToken,
}

impl StopHandle {
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

struct Worker {
    label: String,
    join_handle_opt: Option<JoinHandle<Report>>,
    report_opt: Option<Report>,
}

impl Worker {
    /// Waits for the task to finish. Safe to call again after completion, or after being
    /// cancelled part way through.
    async fn join(&mut self) {
        let join_handle = match self.join_handle_opt.as_mut() {
            Some(join_handle) => join_handle,
            None => return,
        };
        let res = join_handle.await;
        self.join_handle_opt = None;
        match res {
            Ok(report) => {
                self.report_opt = Some(report);
            },
            Err(err) => {
                warn!("{}: forwarding task failed: {}", self.label, err);
            },
        }
    }

    fn abort(&mut self) {
        if let Some(join_handle) = self.join_handle_opt.take() {
            warn!("{}: forwarding task didn't stop in time, aborting", self.label);
            join_handle.abort();
        }
    }
}

/// A TCP relay which accepts a single connection, dials an upstream address and forwards data
/// between the two, delaying every forwarded chunk by a duration drawn from a [`Distribution`].
///
/// Each direction is forwarded by its own [`SimplexRelay`] task so a stall in one direction
/// never holds up the other. Must be used within a multi-threaded `tokio` runtime.
///
/// ```no_run
/// # async fn example() -> Result<(), netdelay::RelayError> {
/// use netdelay::{Distribution, DuplexRelay, RelayConfig};
///
/// let config = {
///     RelayConfig::new("127.0.0.1:5000".parse().unwrap(), "127.0.0.1:5001".parse().unwrap())
///     .distribution(Distribution::gaussian(0.05, 0.01))
/// };
/// let mut relay = DuplexRelay::new(config);
/// relay.start().await?;
/// tokio::signal::ctrl_c().await.unwrap();
/// relay.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct DuplexRelay {
    listen_addr: SocketAddr,
    connect_addr: SocketAddr,
    chunk_size: usize,
    shutdown_timeout: Duration,
    fail_fast: bool,
    distribution_opt: Option<Arc<Distribution>>,
    state: RelayState,
    shutdown: CancellationToken,
    listener_opt: Option<TcpListener>,
    local_addr_opt: Option<SocketAddr>,
    connections: Vec<ShutdownHandle>,
    workers: Vec<Worker>,
}

impl DuplexRelay {
    pub fn new(config: RelayConfig) -> DuplexRelay {
        let RelayConfig {
            listen_addr,
            connect_addr,
            chunk_size,
            distribution,
            shutdown_timeout,
            fail_fast,
        } = config;
        info!("setting up relay from {} to {}", listen_addr, connect_addr);
        DuplexRelay {
            listen_addr,
            connect_addr,
            chunk_size,
            shutdown_timeout,
            fail_fast,
            distribution_opt: distribution.map(Arc::new),
            state: RelayState::Configured,
            shutdown: CancellationToken::new(),
            listener_opt: None,
            local_addr_opt: None,
            connections: Vec::new(),
            workers: Vec::new(),
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn connect_addr(&self) -> SocketAddr {
        self.connect_addr
    }

    /// The address the relay is actually listening on, once bound. Differs from
    /// [`listen_addr`](DuplexRelay::listen_addr) when binding to port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr_opt
    }

    pub fn distribution(&self) -> Option<&Distribution> {
        self.distribution_opt.as_deref()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Sets the delay distribution. Only allowed before the relay has been started.
    pub fn set_distribution(&mut self, distribution: Distribution) -> Result<(), RelayError> {
        if self.state != RelayState::Configured {
            return Err(RelayError::InvalidState {
                op: "set distribution of",
                state: self.state,
            });
        }
        info!("setting delay distribution to {}", distribution);
        self.distribution_opt = Some(Arc::new(distribution));
        Ok(())
    }

    /// Binds the listening socket and returns the bound address. Calling this is optional,
    /// [`start`](DuplexRelay::start) binds if necessary. Must be called within a `tokio` context.
    pub fn listen(&mut self) -> Result<SocketAddr, RelayError> {
        if self.state != RelayState::Configured {
            return Err(RelayError::InvalidState {
                op: "listen on",
                state: self.state,
            });
        }
        let bind_res = crate::net::create_listener(self.listen_addr).and_then(|listener| {
            let local_addr = listener.local_addr()?;
            Ok((listener, local_addr))
        });
        let (listener, local_addr) = match bind_res {
            Ok(bound) => bound,
            Err(source) => {
                self.state = RelayState::Stopped;
                return Err(RelayError::Bind { addr: self.listen_addr, source });
            },
        };
        info!("listening on {}", local_addr);
        self.listener_opt = Some(listener);
        self.local_addr_opt = Some(local_addr);
        self.state = RelayState::Listening;
        Ok(local_addr)
    }

    /// Accepts one inbound connection, connects to the upstream address and starts forwarding
    /// in both directions. Returns once forwarding has started.
    ///
    /// Fails without touching the network if no distribution has been set. Binding, accepting
    /// and connecting are attempted once. On failure the relay is left
    /// [`Stopped`](RelayState::Stopped) and any accepted connection is closed.
    ///
    /// Stopping the relay through a [`StopHandle`] while this is pending makes it return
    /// [`RelayError::Cancelled`]. Dropping the future releases any bound or accepted sockets.
    pub async fn start(&mut self) -> Result<(), RelayError> {
        match self.state {
            RelayState::Configured | RelayState::Listening => (),
            state => return Err(RelayError::InvalidState { op: "start", state }),
        }
        let distribution = match &self.distribution_opt {
            Some(distribution) => distribution.clone(),
            None => return Err(RelayError::NoDistribution),
        };
        self.validate()?;
        if self.state == RelayState::Configured {
            let _local_addr = self.listen()?;
        }

        let (inbound, upstream) = match self.connect().await {
            Ok(connections) => connections,
            Err(err) => {
                self.state = RelayState::Stopped;
                return Err(err);
            },
        };
        self.state = RelayState::Connected;

        let inbound_addr = match inbound.peer_addr() {
            Ok(addr) => addr.to_string(),
            Err(_) => String::from("inbound"),
        };
        self.connections.push(ShutdownHandle::new(&inbound));
        self.connections.push(ShutdownHandle::new(&upstream));
        let (inbound_read, inbound_write) = inbound.into_split();
        let (upstream_read, upstream_write) = upstream.into_split();

        // Cancelled by stop() via the parent token, or by a failing worker when fail_fast is set.
        let pair_shutdown = self.shutdown.child_token();
        let label = format!("{} -> {}", inbound_addr, self.connect_addr);
        self.spawn_worker(
            label, inbound_read, upstream_write, &distribution, &pair_shutdown,
        );
        let label = format!("{} -> {}", self.connect_addr, inbound_addr);
        self.spawn_worker(
            label, upstream_read, inbound_write, &distribution, &pair_shutdown,
        );
        self.state = RelayState::Relaying;
        Ok(())
    }

    fn validate(&self) -> Result<(), RelayError> {
        if self.chunk_size == 0 {
            return Err(RelayError::InvalidConfig("chunk size must be non-zero".to_owned()));
        }
        Ok(())
    }

    async fn connect(&mut self) -> Result<(TcpStream, TcpStream), RelayError> {
        // Only a single connection is ever accepted, the listener is closed once it's done.
        let listener = match self.listener_opt.take() {
            Some(listener) => listener,
            None => return Err(RelayError::Cancelled),
        };
        let accept_res = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Err(RelayError::Cancelled),
            accept_res = listener.accept() => accept_res,
        };
        drop(listener);
        let (inbound, inbound_addr) = match accept_res {
            Ok(accepted) => accepted,
            Err(err) => return Err(RelayError::Accept(err)),
        };
        info!("got connection from {}", inbound_addr);

        info!("connecting to {}...", self.connect_addr);
        let connect_res = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Err(RelayError::Cancelled),
            connect_res = TcpStream::connect(self.connect_addr) => connect_res,
        };
        let upstream = match connect_res {
            Ok(upstream) => upstream,
            Err(source) => {
                // dropping the accepted connection closes it
                drop(inbound);
                return Err(RelayError::Dial { addr: self.connect_addr, source });
            },
        };
        info!("connected, relaying between {} and {}", inbound_addr, self.connect_addr);
        Ok((inbound, upstream))
    }

    fn spawn_worker(
        &mut self,
        label: String,
        source: OwnedReadHalf,
        sink: OwnedWriteHalf,
        distribution: &Arc<Distribution>,
        pair_shutdown: &CancellationToken,
    ) {
        let relay = SimplexRelay::new(
            label.clone(),
            source,
            sink,
            self.chunk_size,
            distribution.clone(),
            pair_shutdown.clone(),
        );
        let fail_fast = self.fail_fast;
        let pair_shutdown = pair_shutdown.clone();
        let join_handle = tokio::spawn(async move {
            let report = relay.run().await;
            if fail_fast {
                if let SimplexEnd::Failed(_) = report.end {
                    debug!("tearing down the other direction");
                    pair_shutdown.cancel();
                }
            }
            report
        });
        self.workers.push(Worker {
            label,
            join_handle_opt: Some(join_handle),
            report_opt: None,
        });
    }

    /// Waits until both forwarding directions have ended, either on their own (the peers closed
    /// their connections or failed) or because the relay was stopped. Returns immediately if the
    /// relay never started relaying. Cancel safe.
    pub async fn wait(&mut self) {
        let _ = future::join_all(self.workers.iter_mut().map(Worker::join)).await;
    }

    /// Stops the relay and closes all its sockets.
    ///
    /// Both connections are shut down, so any read pending on them returns immediately and the
    /// peers see the connections close. Waits up to the configured shutdown timeout for the
    /// forwarding tasks to finish and aborts any that don't. Calling `stop` more than once is a
    /// no-op.
    pub async fn stop(&mut self) {
        if self.state == RelayState::Stopped {
            return;
        }
        debug!("stopping relay {} -> {}", self.listen_addr, self.connect_addr);
        self.state = RelayState::Stopping;
        self.shutdown.cancel();
        for connection in &mut self.connections {
            connection.shutdown();
        }
        let _listener_opt = self.listener_opt.take();

        let join_all = future::join_all(self.workers.iter_mut().map(Worker::join));
        let join_res = tokio::time::timeout(self.shutdown_timeout, join_all).await;
        match join_res {
            Ok(_) => (),
            Err(_elapsed) => {
                for worker in &mut self.workers {
                    worker.abort();
                }
            },
        }

        for worker in &self.workers {
            if let Some(report) = &worker.report_opt {
                debug!("{}: ended with {:?}", worker.label, report.end);
            }
        }
        // drops the connection halves returned by the workers
        self.workers.clear();
        self.connections.clear();
        self.state = RelayState::Stopped;
        debug!("all simplex relays shut down");
    }
}

impl Drop for DuplexRelay {
    fn drop(&mut self) {
        self.shutdown.cancel();
        for connection in &mut self.connections {
            connection.shutdown();
        }
    }
}
