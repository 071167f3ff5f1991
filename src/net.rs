use crate::priv_prelude::*;
use socket2::{Domain, Protocol, SockRef, Socket, Type};

/// Creates a TCP listener with `SO_REUSEADDR` set. Must be called within a `tokio` context.
pub(crate) fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    // only ever accept a single connection
    socket.listen(1)?;
    TcpListener::from_std(std::net::TcpListener::from(socket))
}

/// A duplicate handle to a connected socket which can shut the connection down while other
/// tasks are still reading from or writing to it.
///
/// Shutting down wakes any task blocked reading the socket (it sees EOF) and makes further
/// writes fail, on both ends of the connection.
pub(crate) struct ShutdownHandle {
    socket_opt: Option<Socket>,
}

impl ShutdownHandle {
    pub(crate) fn new(stream: &TcpStream) -> ShutdownHandle {
        let socket_opt = match SockRef::from(stream).try_clone() {
            Ok(socket) => Some(socket),
            Err(err) => {
                warn!("failed to duplicate socket handle: {}", err);
                None
            },
        };
        ShutdownHandle { socket_opt }
    }

    /// Shuts the connection down in both directions and releases the handle. Errors (eg. the
    /// peer already reset the connection) are ignored and calling this more than once is a no-op.
    pub(crate) fn shutdown(&mut self) {
        if let Some(socket) = self.socket_opt.take() {
            match socket.shutdown(Shutdown::Both) {
                Ok(()) => (),
                Err(err) => debug!("ignoring error on socket shutdown: {}", err),
            }
        }
    }
}
