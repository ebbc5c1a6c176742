// Demo binary for the routepool crate: leases TCP connections to a local
// listener, reuses one, and prints pool stats along the way.

use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use routepool::{
    AddressResolver, ConnectionFactory, ConnectionPool, ManagedConnection, PoolConfig,
    TokioConnectionInitiator,
};
use tokio::net::{TcpListener, TcpStream};

struct DirectResolver;

impl AddressResolver<SocketAddr> for DirectResolver {
    fn resolve_remote(&self, route: &SocketAddr) -> io::Result<SocketAddr> {
        Ok(*route)
    }
}

struct DemoConnection {
    stream: Option<TcpStream>,
}

impl ManagedConnection for DemoConnection {
    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

struct DemoFactory;

impl ConnectionFactory<SocketAddr, TcpStream> for DemoFactory {
    type Connection = DemoConnection;

    fn create(&self, _route: &SocketAddr, session: TcpStream) -> io::Result<DemoConnection> {
        Ok(DemoConnection {
            stream: Some(session),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().init();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let mut accepted = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            accepted.push(stream);
        }
    });

    let pool: ConnectionPool<SocketAddr, TokioConnectionInitiator, DemoFactory> =
        ConnectionPool::new(
            TokioConnectionInitiator::new(),
            DemoFactory,
            DirectResolver,
            PoolConfig::default(),
        );

    let entry = pool
        .lease(addr, None, Some(Duration::from_secs(5)))?
        .await?;
    println!("leased connection {} to {}", entry.id(), entry.route());
    pool.release(&entry, true);

    let reused = pool
        .lease(addr, None, Some(Duration::from_secs(5)))?
        .await?;
    println!("reused connection {}", reused.id());
    println!("stats: {}", pool.total_stats());
    pool.release(&reused, true);

    pool.shutdown(Duration::from_secs(1));
    Ok(())
}
