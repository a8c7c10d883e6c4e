//! # lifeline
//!
//! A supervised lifecycle for HTTP services. Start a listener, serve until
//! told to stop, drain in-flight requests within a grace period, report one
//! outcome. Nothing more.
//!
//! ## The contract
//!
//! A process supervisor owns a [`CancellationToken`] per service and calls
//! [`HttpService::run`]. The future resolves exactly once:
//!
//! - `Ok(())`: cancellation was observed and every connection drained in time.
//! - [`Error::Bind`] / [`Error::Serve`]: the listener could not be bound, or
//!   accepting failed before shutdown was requested.
//! - [`Error::DrainTimeout`]: shutdown began, but some requests outlived the
//!   grace period and were dropped.
//! - [`Error::Drain`]: the drain itself broke.
//!
//! Every transition (starting, shutting down, stopped) is also logged through
//! `tracing`, but the returned value is the authoritative result.
//!
//! What this crate intentionally leaves to others: routing, middleware, TLS,
//! and deciding whether to restart a failed service.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use lifeline::{CancellationToken, HttpService, Request, ServiceConfig, signal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lifeline::Error> {
//!     let token = CancellationToken::new();
//!     signal::cancel_on_shutdown_signal(token.clone());
//!
//!     let config = ServiceConfig::new(":3000").with_shutdown_grace(Duration::from_secs(10));
//!     HttpService::new(config, hello).run(token).await
//! }
//!
//! async fn hello(req: Request) -> String {
//!     format!("hello from {}", req.path())
//! }
//! ```

mod config;
mod descriptor;
mod error;
mod handler;
mod log_sink;
mod request;
mod response;
mod server;

pub mod signal;

pub use config::{DEFAULT_HEADER_READ_TIMEOUT, DEFAULT_SHUTDOWN_GRACE, ServiceConfig};
pub use descriptor::{Describe, ServiceDescriptor};
pub use error::{BoxError, Error};
pub use handler::Handler;
pub use log_sink::ErrorLog;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use server::{DEFAULT_NAME, HttpService};
pub use tokio_util::sync::CancellationToken;
