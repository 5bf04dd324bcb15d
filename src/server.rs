//! TCP accept loop, per-connection worker and graceful shutdown.
//!
//! Each accepted connection gets its own task. The task reads one request,
//! dispatches it, writes one response and closes the stream. There is no
//! keep-alive, no pipelining and no read timeout: a client that never
//! finishes its request holds its task until it disconnects.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **SIGINT** the server:
//! 1. stops calling `listener.accept()`;
//! 2. lets every in-flight connection task run to completion;
//! 3. returns from [`Server::serve`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::dispatcher::dispatch;
use crate::error::Error;
use crate::request::{DEFAULT_MAX_BODY_SIZE, read_request};
use crate::response::{Envelope, JSON};
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    content_type: Arc<str>,
    max_body_size: usize,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust,no_run
    /// use tsurezure::Server;
    /// let server = Server::bind("0.0.0.0:8888")?;
    /// # Ok::<(), tsurezure::Error>(())
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse()
            .map_err(|_| Error::InvalidAddress(addr.to_owned()))?;
        Ok(Self { addr, content_type: Arc::from(JSON), max_body_size: DEFAULT_MAX_BODY_SIZE })
    }

    /// Content type written when an envelope has no `content_type` option.
    /// Defaults to `application/json`.
    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = Arc::from(content_type);
        self
    }

    /// Largest request body accepted, in bytes. A larger `Content-Length`
    /// is answered with `400`. Defaults to 2 MiB.
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`Server::serve`], but stops accepting when `shutdown` resolves.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;

        // From here on the routing table is only reachable through `&`.
        let router = Arc::new(router);

        info!(addr = %listener.local_addr()?, "tsurezure listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting immediately,
                // even if more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let content_type = Arc::clone(&self.content_type);
                    let max_body_size = self.max_body_size;

                    tasks.spawn(async move {
                        let served = serve_bounded(stream, &router, &content_type, max_body_size).await;
                        if let Err(e) = served {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("tsurezure stopped");
        Ok(())
    }
}

// ── Connection worker ─────────────────────────────────────────────────────────

/// Serves exactly one request on an open stream, then closes it.
///
/// Parse failures are answered with `400` and never escape this function;
/// the only error returned is an I/O failure while writing the response.
/// Bodies are capped at 2 MiB; [`Server::max_body_size`] changes the cap for
/// connections the server accepts itself.
pub async fn serve_connection<S>(
    stream: S,
    router: &Router,
    default_content_type: &str,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    serve_bounded(stream, router, default_content_type, DEFAULT_MAX_BODY_SIZE).await
}

async fn serve_bounded<S>(
    stream: S,
    router: &Router,
    default_content_type: &str,
    max_body_size: usize,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);

    let envelope = match read_request(&mut stream, max_body_size).await {
        Ok(Some(req)) => {
            let method = req.method().to_owned();
            let path = req.path().to_owned();
            let envelope = dispatch(router, req).await;
            debug!(%method, %path, status = envelope.status, "request dispatched");
            envelope
        }
        Ok(None) => {
            debug!("peer closed before sending a request");
            return Ok(());
        }
        Err(e) => {
            warn!("rejecting request: {e}");
            Envelope::bad_request(e)
        }
    };

    envelope.write_to(stream, default_content_type).await
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. A handler that cannot be installed
/// is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
