//! Unified error type.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Boxed error used for drain failures whose concrete type is not ours.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a service lifecycle ended in something other than a clean shutdown.
///
/// `Ok(())` from [`HttpService::run`](crate::HttpService::run) is the clean
/// outcome. Every other outcome is one of these variants, and each variant
/// renders a message that tells "shutdown was slow" apart from "shutdown was
/// broken".
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The listener could not be bound. No shutdown sequence ever started.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The accept loop hit a non-transient error before shutdown was requested.
    #[error("serve loop failed: {0}")]
    Serve(#[source] io::Error),

    /// Cancellation was observed but in-flight connections outlived the grace
    /// period and were abandoned.
    #[error("shutdown grace period of {grace:?} elapsed with {abandoned} connection(s) still open")]
    DrainTimeout { grace: Duration, abandoned: usize },

    /// The drain itself failed for a reason other than the grace period.
    #[error("drain failed: {0}")]
    Drain(#[source] BoxError),
}

impl Error {
    /// `true` for failures to bind or to keep accepting.
    pub fn is_bind_or_serve(&self) -> bool {
        matches!(self, Self::Bind { .. } | Self::Serve(_))
    }

    /// `true` when requests may have been lost to grace-period expiry.
    pub fn is_drain_timeout(&self) -> bool {
        matches!(self, Self::DrainTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_drain_failure_render_differently() {
        let timeout = Error::DrainTimeout { grace: Duration::from_secs(5), abandoned: 2 };
        let broken = Error::Drain("listener refused to close".into());

        assert!(timeout.is_drain_timeout());
        assert!(!broken.is_drain_timeout());
        assert_eq!(
            timeout.to_string(),
            "shutdown grace period of 5s elapsed with 2 connection(s) still open"
        );
        assert_eq!(broken.to_string(), "drain failed: listener refused to close");
    }

    #[test]
    fn bind_keeps_its_source() {
        let err = Error::Bind {
            addr: "0.0.0.0:80".into(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        assert!(err.is_bind_or_serve());
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("failed to bind 0.0.0.0:80: "));
    }
}
