//! HTTP service lifecycle and shutdown coordination.
//!
//! # How a run ends
//!
//! [`HttpService::run`] serves until the caller's [`CancellationToken`] is
//! cancelled (a supervisor stopping the process, SIGTERM, a test tearing
//! down). Then:
//!
//! 1. `listener.accept()` stops. No new connections are made.
//! 2. Every live connection is told to shut down gracefully: idle keep-alive
//!    connections close, in-flight requests run to completion.
//! 3. If that takes longer than the shutdown grace period, the stragglers are
//!    dropped and the run reports [`Error::DrainTimeout`].
//!
//! The grace period is measured from the moment cancellation is observed,
//! never from any deadline the caller attached to their own token.
//!
//! # Kubernetes
//!
//! Keep the grace period comfortably below `terminationGracePeriodSeconds`
//! (default 30 s), or the kubelet's SIGKILL will beat the drain.

use std::borrow::Cow;
use std::convert::Infallible;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span, debug, error, info};

use crate::config::ServiceConfig;
use crate::descriptor::{Describe, ServiceDescriptor};
use crate::error::Error;
use crate::handler::{BoxedHandler, ConnContext, Handler};
use crate::log_sink::ErrorLog;

/// Name reported by [`Describe::describe`] unless overridden with
/// [`HttpService::named`].
pub const DEFAULT_NAME: &str = "http";

const MIN_ACCEPT_BACKOFF: Duration = Duration::from_millis(5);
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// An HTTP service that runs once, under an external cancellation token.
///
/// `run` and `serve` consume the service: a lifecycle happens at most once.
pub struct HttpService {
    config: ServiceConfig,
    handler: BoxedHandler,
    descriptor: ServiceDescriptor,
    span: Option<Span>,
}

impl HttpService {
    pub fn new(config: ServiceConfig, handler: impl Handler) -> Self {
        Self {
            config,
            handler: handler.into_boxed_handler(),
            descriptor: ServiceDescriptor::new(DEFAULT_NAME),
            span: None,
        }
    }

    /// Overrides the name reported to supervisors.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.descriptor = ServiceDescriptor::new(name);
        self
    }

    /// Emits every lifecycle and transport event inside `span`.
    ///
    /// Without one, the service logs under `http{service=<name>}`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Binds the configured address, then [`serve`](Self::serve)s.
    ///
    /// A bind failure returns [`Error::Bind`] straight away. No shutdown
    /// sequence is started, so `signal` is never consulted.
    pub async fn run(self, signal: CancellationToken) -> Result<(), Error> {
        let span = self.span();
        let addr = self.config.listen_addr().into_owned();

        let listener = match TcpListener::bind(addr.as_str()).await {
            Ok(listener) => listener,
            Err(source) => {
                let err = Error::Bind { addr, source };
                span.in_scope(|| error!(error = %err, "http server stopped with error"));
                return Err(err);
            }
        };

        self.coordinate(listener, signal, span.clone()).instrument(span).await
    }

    /// Serves an already-bound listener until `signal` is cancelled and the
    /// drain has finished.
    ///
    /// The configured address is ignored; everything else applies.
    pub async fn serve(self, listener: TcpListener, signal: CancellationToken) -> Result<(), Error> {
        let span = self.span();
        self.coordinate(listener, signal, span.clone()).instrument(span).await
    }

    fn span(&self) -> Span {
        self.span
            .clone()
            .unwrap_or_else(|| tracing::info_span!("http", service = %self.descriptor))
    }

    async fn coordinate(
        self,
        listener: TcpListener,
        signal: CancellationToken,
        span: Span,
    ) -> Result<(), Error> {
        match listener.local_addr() {
            Ok(addr) => info!(%addr, url = %browse_url(addr), "http server starting"),
            Err(_) => info!("http server starting"),
        }

        let drain = Drain::new(self.config.shutdown_grace());

        // Spawned before the accept loop starts, and with no fast path for an
        // already-cancelled signal: the drain always runs the same way.
        let (tx, rx) = oneshot::channel();
        let watcher = tokio::spawn(watch(signal.clone(), drain.clone(), tx).instrument(span.clone()));

        let acceptor = Acceptor {
            builder: connection_builder(&self.config),
            header_read_timeout: self.config.header_read_timeout(),
            handler: self.handler,
            signal,
            drain: drain.clone(),
            log: ErrorLog::new(span.clone()),
            span,
        };

        let result = match acceptor.accept_loop(listener).await {
            ServeExit::Failed(e) => {
                // Nothing is draining yet; don't wait for a drain that may never come.
                watcher.abort();
                drain.closing.cancel();
                Err(Error::Serve(e))
            }
            ServeExit::Closed => match rx.await {
                Ok(drained) => drained,
                Err(_) => Err(watcher_failure(watcher).await),
            },
        };

        match &result {
            Ok(()) => info!("http server stopped"),
            Err(e) => error!(error = %e, "http server stopped with error"),
        }
        result
    }
}

impl Describe for HttpService {
    fn describe(&self) -> ServiceDescriptor {
        self.descriptor.clone()
    }
}

/// How the accept loop ended.
#[derive(Debug)]
enum ServeExit {
    /// The drain closed the listener. The expected way out, not a failure.
    Closed,
    Failed(io::Error),
}

/// Shared between the accept loop, every connection task and the watcher.
#[derive(Clone)]
struct Drain {
    /// Stops accepting and asks connections to finish up. Not derived from
    /// the caller's token.
    closing: CancellationToken,
    /// Fired when the grace period runs out; remaining connections are dropped.
    abort: CancellationToken,
    connections: TaskTracker,
    grace: Duration,
}

impl Drain {
    fn new(grace: Duration) -> Self {
        Self {
            closing: CancellationToken::new(),
            abort: CancellationToken::new(),
            connections: TaskTracker::new(),
            grace,
        }
    }

    async fn run(&self) -> Result<(), Error> {
        self.closing.cancel();
        self.connections.close();
        debug!(in_flight = self.connections.len(), "draining connections");

        if tokio::time::timeout(self.grace, self.connections.wait()).await.is_ok() {
            return Ok(());
        }

        let abandoned = self.connections.len();
        self.abort.cancel();
        Err(Error::DrainTimeout { grace: self.grace, abandoned })
    }
}

/// The watcher: waits for cancellation, drains, reports exactly once.
async fn watch(signal: CancellationToken, drain: Drain, tx: oneshot::Sender<Result<(), Error>>) {
    signal.cancelled().await;
    info!(grace = ?drain.grace, "http server shutting down");
    let _ = tx.send(drain.run().await);
}

/// Called when the watcher dropped its sender without reporting.
async fn watcher_failure(watcher: JoinHandle<()>) -> Error {
    match watcher.await {
        Err(e) => Error::Drain(Box::new(e)),
        Ok(()) => Error::Drain("drain finished without reporting a result".into()),
    }
}

struct Acceptor {
    builder: ConnBuilder<TokioExecutor>,
    header_read_timeout: Duration,
    handler: BoxedHandler,
    signal: CancellationToken,
    drain: Drain,
    log: ErrorLog,
    span: Span,
}

impl Acceptor {
    async fn accept_loop(mut self, listener: TcpListener) -> ServeExit {
        let closing = self.drain.closing.clone();
        let mut backoff: Option<Duration> = None;

        loop {
            // `biased`: once closing fires, no queued connection is accepted.
            let accepted = tokio::select! {
                biased;
                () = closing.cancelled() => return ServeExit::Closed,
                res = listener.accept() => res,
            };

            match accepted {
                Ok((stream, peer)) => {
                    backoff = None;
                    self.spawn_connection(stream, peer);
                }
                Err(e) if is_transient(&e) => {
                    let delay = backoff.map_or(MIN_ACCEPT_BACKOFF, |d| (d * 2).min(MAX_ACCEPT_BACKOFF));
                    backoff = Some(delay);
                    let _ = self
                        .log
                        .write_all(format!("http: accept error: {e}; retrying in {delay:?}").as_bytes());

                    tokio::select! {
                        biased;
                        () = closing.cancelled() => return ServeExit::Closed,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return ServeExit::Failed(e),
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let io = TokioIo::new(stream);
        let builder = self.builder.clone();
        let handler = Arc::clone(&self.handler);
        let ctx = ConnContext { peer, shutdown: self.signal.clone(), log: self.log.clone() };
        let closing = self.drain.closing.clone();
        let abort = self.drain.abort.clone();
        let head_timeout = self.header_read_timeout;
        let mut log = self.log.clone();

        let task = async move {
            let first_head = CancellationToken::new();
            let head_seen = first_head.clone();
            // Called once per request on the connection, not once per connection.
            let svc = service_fn(move |req| {
                head_seen.cancel();
                let reply = handler.dispatch(req, &ctx);
                async move { Ok::<_, Infallible>(reply.await) }
            });

            let conn = builder.serve_connection(io, svc);
            tokio::pin!(conn);

            // hyper only times request heads once protocol detection has seen a
            // byte; this bounds the wait for the first head from accept onwards.
            let no_head = async {
                if tokio::time::timeout(head_timeout, first_head.cancelled()).await.is_ok() {
                    std::future::pending::<()>().await;
                }
            };
            tokio::pin!(no_head);

            let served = tokio::select! {
                res = conn.as_mut() => res,
                () = &mut no_head => {
                    let _ = log.write_all(
                        format!("http: no request head from {peer} within {head_timeout:?}").as_bytes(),
                    );
                    return;
                }
                () = closing.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    let res = tokio::select! {
                        res = conn.as_mut() => res,
                        () = abort.cancelled() => {
                            debug!(%peer, "abandoning connection after grace period");
                            return;
                        }
                    };
                    match res {
                        // Protocol detection cut short by the shutdown itself.
                        Err(e) if !e.is::<hyper::Error>() => {
                            debug!(%peer, error = %e, "connection closed while draining");
                            return;
                        }
                        res => res,
                    }
                }
            };

            if let Err(e) = served {
                let _ = log.write_all(format!("http: error serving connection from {peer}: {e}").as_bytes());
            }
        };

        self.drain.connections.spawn(task.instrument(self.span.clone()));
    }
}

/// HTTP/1 and HTTP/2, whichever the client speaks, with the header-read
/// timeout applied to HTTP/1 request heads.
fn connection_builder(config: &ServiceConfig) -> ConnBuilder<TokioExecutor> {
    let mut builder = ConnBuilder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(config.header_read_timeout());
    builder
}

/// Accept errors that say something about one connection or about momentary
/// resource pressure, not about the listener itself.
fn is_transient(e: &io::Error) -> bool {
    const ENFILE: i32 = 23;
    const EMFILE: i32 = 24;

    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) || matches!(e.raw_os_error(), Some(ENFILE | EMFILE))
}

fn browse_url(addr: SocketAddr) -> String {
    if addr.ip().is_unspecified() {
        format!("http://localhost:{}", addr.port())
    } else {
        format!("http://{addr}")
    }
}
