pub(crate) use {
    std::{
        fmt, io,
        collections::BTreeMap,
        net::{Shutdown, SocketAddr},
        path::{Path, PathBuf},
        sync::Arc,
        time::{Duration, Instant},
    },
    bytes::BytesMut,
    futures::future,
    log::{debug, info, trace, warn},
    rand::Rng,
    rand_distr::{Exp1, StandardNormal},
    serde::Deserialize,
    tokio::{
        io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    },
    tokio_util::sync::CancellationToken,
    crate::{
        config::{FileConfig, ProxyConfig, RelayConfig},
        distribution::Distribution,
        duplex::{DuplexRelay, RelayState, StopHandle},
        error::{ConfigError, RelayError},
        net::ShutdownHandle,
        registry::{DistributionEntry, ParamKind, ParamSpec, ParamValue, Params},
        simplex::{SimplexEnd, SimplexRelay, SimplexReport},
        util,
    },
};
