use crate::priv_prelude::*;

/// Forwards bytes in one direction, from a source to a sink, delaying every chunk by a duration
/// drawn from a [`Distribution`].
///
/// Each iteration reads up to `chunk_size` bytes from the source, waits for a sampled delay, then
/// writes the whole chunk to the sink. Chunks are forwarded one at a time in the order they were
/// read. The relay never closes its source or sink, it hands them back in the
/// [`SimplexReport`] returned by [`run`](SimplexRelay::run).
pub struct SimplexRelay<R, W> {
    label: String,
    source: R,
    sink: W,
    chunk_size: usize,
    distribution: Arc<Distribution>,
    shutdown: CancellationToken,
}

/// Why a [`SimplexRelay`] stopped.
#[derive(Debug)]
pub enum SimplexEnd {
    /// The source closed the connection.
    Eof,
    /// The shutdown token was cancelled.
    Cancelled,
    /// Reading from the source or writing to the sink failed.
    Failed(io::Error),
}

/// The outcome of running a [`SimplexRelay`].
#[derive(Debug)]
pub struct SimplexReport<R, W> {
    pub source: R,
    pub sink: W,
    pub end: SimplexEnd,
    /// Total number of bytes written to the sink.
    pub bytes: u64,
    /// Number of chunks written to the sink.
    pub chunks: u64,
}

enum Step {
    Forwarded(usize),
    Stop(SimplexEnd),
}

impl<R, W> SimplexRelay<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a relay. `label` identifies the direction in log messages.
    ///
    /// # Panics
    ///
    /// If `chunk_size` is zero.
    pub fn new(
        label: impl Into<String>,
        source: R,
        sink: W,
        chunk_size: usize,
        distribution: Arc<Distribution>,
        shutdown: CancellationToken,
    ) -> SimplexRelay<R, W> {
        assert!(chunk_size > 0, "chunk_size must be non-zero");
        SimplexRelay {
            label: label.into(),
            source,
            sink,
            chunk_size,
            distribution,
            shutdown,
        }
    }

    /// Relays data until the source closes, an I/O error occurs or the shutdown token is
    /// cancelled. Cancellation interrupts a pending read, delay or write immediately.
    pub async fn run(mut self) -> SimplexReport<R, W> {
        info!("{}: relaying data", self.label);
        let mut buffer = BytesMut::zeroed(self.chunk_size);
        let mut bytes = 0u64;
        let mut chunks = 0u64;
        let end = loop {
            if self.shutdown.is_cancelled() {
                break SimplexEnd::Cancelled;
            }
            match self.forward_chunk(&mut buffer).await {
                Step::Forwarded(len) => {
                    bytes += len as u64;
                    chunks += 1;
                },
                Step::Stop(end) => break end,
            }
        };
        match &end {
            SimplexEnd::Eof => info!("{}: source closed, done relaying", self.label),
            SimplexEnd::Cancelled => info!("{}: stopped", self.label),
            SimplexEnd::Failed(err) => warn!("{}: {}", self.label, err),
        }
        debug!("{}: forwarded {} bytes in {} chunks", self.label, bytes, chunks);
        SimplexReport {
            source: self.source,
            sink: self.sink,
            end,
            bytes,
            chunks,
        }
    }

    async fn forward_chunk(&mut self, buffer: &mut BytesMut) -> Step {
        let read_res = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Step::Stop(SimplexEnd::Cancelled),
            read_res = self.source.read(&mut buffer[..]) => read_res,
        };
        let len = match read_res {
            Ok(0) => return Step::Stop(SimplexEnd::Eof),
            Ok(len) => len,
            Err(err) => return Step::Stop(SimplexEnd::Failed(err)),
        };

        let delay = self.distribution.sample_duration();
        trace!("{}: delaying {} bytes by {:?}", self.label, len, delay);
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Step::Stop(SimplexEnd::Cancelled),
            () = tokio::time::sleep(delay) => (),
        }

        let write_res = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Step::Stop(SimplexEnd::Cancelled),
            write_res = self.sink.write_all(&buffer[..len]) => write_res,
        };
        match write_res {
            Ok(()) => Step::Forwarded(len),
            Err(err) => Step::Stop(SimplexEnd::Failed(err)),
        }
    }
}
