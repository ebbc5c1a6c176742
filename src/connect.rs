//! Interfaces between the pool and the connection-opening machinery

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::net::{TcpSocket, TcpStream};

/// Boxed future returned by a connect attempt
pub type ConnectFuture<S> = Pin<Box<dyn Future<Output = io::Result<S>> + Send>>;

/// Lifecycle state of a connection initiator
///
/// States are ordered; the pool only resumes dispatching after a cancelled
/// attempt while the initiator is at most [`ReactorStatus::Active`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReactorStatus {
    Inactive,
    Active,
    ShuttingDown,
    ShutDown,
}

/// Initiates asynchronous outbound connections on behalf of the pool
pub trait ConnectionInitiator: Send + Sync + 'static {
    /// Transport-level session produced by a successful connect
    type Session: Send + 'static;

    /// Start connecting to `remote`, optionally binding `local` first
    fn connect(&self, remote: SocketAddr, local: Option<SocketAddr>)
        -> ConnectFuture<Self::Session>;

    /// Current lifecycle state
    fn status(&self) -> ReactorStatus;

    /// Stop initiating connections, waiting up to `wait` for in-flight work
    fn shutdown(&self, wait: Duration);
}

/// Maps an opaque route to the socket addresses used to reach it
pub trait AddressResolver<R>: Send + Sync + 'static {
    fn resolve_remote(&self, route: &R) -> io::Result<SocketAddr>;

    /// Local address to bind before connecting, `None` for any
    fn resolve_local(&self, _route: &R) -> io::Result<Option<SocketAddr>> {
        Ok(None)
    }
}

/// Builds a wire-level connection from a ready transport session
pub trait ConnectionFactory<R, Session>: Send + Sync + 'static {
    type Connection: ManagedConnection;

    fn create(&self, route: &R, session: Session) -> io::Result<Self::Connection>;
}

/// A connection the pool can hold, probe, and close
pub trait ManagedConnection: Send + 'static {
    fn is_open(&self) -> bool;

    fn close(&mut self);
}

/// Connection initiator backed by the tokio TCP stack
///
/// The session type is a plain [`TcpStream`]; a [`ConnectionFactory`] turns
/// it into whatever wire-level connection the caller pools.
pub struct TokioConnectionInitiator {
    status: AtomicU8,
}

impl TokioConnectionInitiator {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(ReactorStatus::Active as u8),
        }
    }
}

impl Default for TokioConnectionInitiator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionInitiator for TokioConnectionInitiator {
    type Session = TcpStream;

    fn connect(&self, remote: SocketAddr, local: Option<SocketAddr>)
        -> ConnectFuture<TcpStream> {
        Box::pin(async move {
            match local {
                Some(addr) => {
                    let socket = if addr.is_ipv4() {
                        TcpSocket::new_v4()?
                    } else {
                        TcpSocket::new_v6()?
                    };
                    socket.bind(addr)?;
                    socket.connect(remote).await
                }
                None => TcpStream::connect(remote).await,
            }
        })
    }

    fn status(&self) -> ReactorStatus {
        match self.status.load(Ordering::Acquire) {
            0 => ReactorStatus::Inactive,
            1 => ReactorStatus::Active,
            2 => ReactorStatus::ShuttingDown,
            _ => ReactorStatus::ShutDown,
        }
    }

    fn shutdown(&self, _wait: Duration) {
        self.status
            .store(ReactorStatus::ShutDown as u8, Ordering::Release);
    }
}
