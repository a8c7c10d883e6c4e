//! The request handler capability.
//!
//! A service runs exactly one handler, shared by every connection task. It is
//! stored type-erased so the coordinator never names the user's function type:
//!
//! ```text
//! async fn app(req: Request) -> impl IntoResponse      user code
//!        ↓ HttpService::new(config, app)
//! Arc<FnHandler<app>>  as BoxedHandler                  erased once
//!        ↓ per request
//! handler.dispatch(hyper_req, &conn) → http::Response   wire-ready
//! ```
//!
//! Dispatch owns the whole hop from hyper to hyper: it wraps the raw request
//! with what the connection knows (peer address, service token), runs the
//! handler, and lowers the result, reporting unsendable responses to the
//! connection's error sink.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use tokio_util::sync::CancellationToken;

use crate::log_sink::ErrorLog;
use crate::request::Request;
use crate::response::IntoResponse;

pub(crate) type Reply = http::Response<Full<Bytes>>;

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Reply> + Send + 'static>>;

/// What a connection task knows that its requests should too.
#[derive(Clone)]
pub(crate) struct ConnContext {
    pub(crate) peer: SocketAddr,
    pub(crate) shutdown: CancellationToken,
    pub(crate) log: ErrorLog,
}

#[doc(hidden)]
pub trait ErasedHandler {
    fn dispatch(&self, req: hyper::Request<Incoming>, conn: &ConnContext) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Any `Fn(Request) -> impl Future<Output = impl IntoResponse>`.
///
/// Sealed; satisfied by async functions and closures of that shape:
///
/// ```rust
/// use lifeline::{IntoResponse, Request};
///
/// async fn whoami(req: Request) -> impl IntoResponse {
///     req.peer_addr().ip().to_string()
/// }
/// ```
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn dispatch(&self, req: hyper::Request<Incoming>, conn: &ConnContext) -> BoxFuture {
        let fut = (self.0)(Request::new(req, conn.peer, conn.shutdown.clone()));
        let mut log = conn.log.clone();
        Box::pin(async move { fut.await.into_response().into_http(&mut log) })
    }
}
