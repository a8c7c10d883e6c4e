//! Incoming HTTP request type.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use tokio_util::sync::CancellationToken;

/// An incoming HTTP request, as handed to the service's handler.
///
/// Besides the usual request parts, every request carries the cancellation
/// token the service itself is running under, so long-running handlers can
/// notice that shutdown has begun and wrap up early.
pub struct Request {
    inner: hyper::Request<Incoming>,
    peer: SocketAddr,
    shutdown: CancellationToken,
}

impl Request {
    pub(crate) fn new(inner: hyper::Request<Incoming>, peer: SocketAddr, shutdown: CancellationToken) -> Self {
        Self { inner, peer, shutdown }
    }

    pub fn method(&self) -> &Method { self.inner.method() }
    pub fn uri(&self) -> &Uri { self.inner.uri() }
    pub fn path(&self) -> &str { self.inner.uri().path() }
    pub fn headers(&self) -> &HeaderMap { self.inner.headers() }

    /// Header lookup. Values that are not visible ASCII are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name)?.to_str().ok()
    }

    /// Address of the client on the other end of the connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// The service's cancellation token.
    ///
    /// Cancelled as soon as the service is told to stop; the connection this
    /// request arrived on is then drained, not killed, so finishing the
    /// response is still worthwhile.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Reads the whole body into memory.
    pub async fn body(self) -> Result<Bytes, hyper::Error> {
        Ok(self.inner.into_body().collect().await?.to_bytes())
    }

    /// Gives up the wrapper for the raw hyper request.
    pub fn into_inner(self) -> hyper::Request<Incoming> {
        self.inner
    }
}
