//! Server loop: listener setup, dispatch, connection handling
//!
//! One task per connection, no keep-alive: read one request, answer it,
//! close. Deadlines bound every socket operation, and per-connection
//! errors never escape the connection's task.

use crate::error::{Error, Result};
use crate::handlers;
use crate::pool::BufferPool;
use crate::request::{Request, MAX_REQUEST_BYTES};
use crate::response::Response;
use crate::watch::Watcher;
use socket2::{Domain, Protocol, Socket, Type};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub hostname: String,
    /// Directory files are served from
    pub root: PathBuf,
    pub workers: usize,
    /// Cadence of the background change watcher
    pub watch_interval: Duration,
    /// Deadline applied to every socket read and write
    pub io_deadline: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            hostname: "0.0.0.0".to_string(),
            root: PathBuf::from("."),
            workers: num_cpus::get(),
            watch_interval: Duration::from_millis(250),
            io_deadline: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Defaults with environment overrides: `BREEZE_PORT`, `BREEZE_HOST`,
    /// `BREEZE_ROOT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(port) = std::env::var("BREEZE_PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(host) = std::env::var("BREEZE_HOST") {
            config.hostname = host;
        }
        if let Ok(root) = std::env::var("BREEZE_ROOT") {
            config.root = PathBuf::from(root);
        }
        config
    }
}

/// State shared into every connection task.
///
/// Owned by the accept loop; tests construct isolated contexts instead of
/// relying on process-wide state.
pub struct ServerContext {
    pub config: ServerConfig,
    pub pool: BufferPool,
    pub watcher: Arc<Watcher>,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Self {
        let watcher = Arc::new(Watcher::new(config.root.clone()));
        Self {
            config,
            pool: BufferPool::new(),
            watcher,
        }
    }
}

/// Tracks active connections for graceful shutdown.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    /// Active connection count
    active: AtomicU64,
    /// Shutdown signal received
    shutting_down: AtomicBool,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn decrement(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Signal that shutdown is in progress
    pub fn start_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

/// Create the listening socket.
///
/// SO_REUSEADDR allows rebinding an address in TIME_WAIT; TCP_NODELAY
/// disables Nagle's algorithm for the small one-shot responses we send.
fn create_listener(addr: &SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;
    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// The dev server: accept loop plus the shared context behind it.
pub struct Server {
    ctx: Arc<ServerContext>,
    tracker: Arc<ConnectionTracker>,
}

impl Server {
    pub fn new(ctx: ServerContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            tracker: Arc::new(ConnectionTracker::new()),
        }
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    pub fn tracker(&self) -> &Arc<ConnectionTracker> {
        &self.tracker
    }

    /// Bind the configured address. Failure here is fatal for the caller.
    pub fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.ctx.config.hostname, self.ctx.config.port);
        let addr: SocketAddr = addr.parse().map_err(|_| Error::InvalidAddress(addr))?;
        let listener = create_listener(&addr)?;
        let listener = TcpListener::from_std(listener)?;
        info!(addr = %listener.local_addr()?, "breeze listening");
        Ok(listener)
    }

    /// Bind, start the background watcher, and serve until `shutdown`
    /// resolves.
    pub async fn serve<S>(&self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let listener = self.bind()?;
        let watch_task = Arc::clone(&self.ctx.watcher)
            .spawn(self.ctx.config.watch_interval, Arc::clone(&self.tracker));

        let result = self.serve_on(listener, shutdown).await;
        let _ = watch_task.await;
        result
    }

    /// Accept loop over an already-bound listener. Stops when `shutdown`
    /// resolves, then drains in-flight connections.
    pub async fn serve_on<S>(&self, listener: TcpListener, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, draining connections");
                    self.tracker.start_shutdown();
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let ctx = Arc::clone(&self.ctx);
                            let tracker = Arc::clone(&self.tracker);
                            tracker.increment();
                            tokio::spawn(async move {
                                if let Err(err) = handle_connection(&ctx, stream).await {
                                    debug!(%peer, %err, "connection error");
                                }
                                tracker.decrement();
                            });
                        }
                        Err(err) => {
                            warn!(%err, "accept failed");
                        }
                    }
                }
            }
        }

        while self.tracker.count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }
}

/// Read one request, dispatch it, write the response, close.
async fn handle_connection(ctx: &Arc<ServerContext>, mut stream: TcpStream) -> Result<()> {
    let deadline = ctx.config.io_deadline;

    let mut buf = ctx.pool.allocate(MAX_REQUEST_BYTES)?;
    let n = timeout(deadline, stream.read(&mut buf[..]))
        .await
        .map_err(|_| Error::Timeout)??;

    let response = match Request::parse(&buf[..n]) {
        Ok(req) => {
            info!(method = %req.method, path = %req.path, "request");
            handlers::dispatch(ctx, &req).await
        }
        Err(err) => {
            debug!(%err, "rejecting malformed request");
            Response::bad_request()
        }
    };

    write_response(ctx, &mut stream, response, deadline).await
}

/// Serialize and send: header first, body second, no retry on failure.
async fn write_response(
    ctx: &ServerContext,
    stream: &mut TcpStream,
    response: Response,
    deadline: Duration,
) -> Result<()> {
    let (response, header, header_len) = match response.serialize_header(&ctx.pool) {
        Ok((header, len)) => (response, header, len),
        Err(err) => {
            warn!(%err, "header serialization failed");
            let fallback = Response::internal_error();
            let (header, len) = fallback.serialize_header(&ctx.pool)?;
            (fallback, header, len)
        }
    };

    timeout(deadline, stream.write_all(&header[..header_len]))
        .await
        .map_err(|_| Error::Timeout)??;

    let body = response.body.as_bytes();
    if !body.is_empty() {
        timeout(deadline, stream.write_all(body))
            .await
            .map_err(|_| Error::Timeout)??;
    }
    Ok(())
}
