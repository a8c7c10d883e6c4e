//! Service configuration.
//!
//! Nothing here is validated up front. An address the OS cannot bind shows up
//! as [`Error::Bind`](crate::Error::Bind) when the service runs.

use std::borrow::Cow;
use std::time::Duration;

/// How long a client may take to send a complete request head.
///
/// Guards against slow-loris style clients holding a connection open with a
/// trickle of header bytes. It does not bound the body or the handler.
pub const DEFAULT_HEADER_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// How long in-flight requests may keep running once shutdown begins.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Everything needed to start serving, except the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    addr: String,
    header_read_timeout: Duration,
    shutdown_grace: Duration,
}

impl ServiceConfig {
    /// `addr` is `host:port`, or `:port` for all interfaces.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            header_read_timeout: DEFAULT_HEADER_READ_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_header_read_timeout(mut self, timeout: Duration) -> Self {
        self.header_read_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn header_read_timeout(&self) -> Duration {
        self.header_read_timeout
    }

    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    /// The address handed to the socket layer.
    ///
    /// An empty host means every interface; an empty address means port 80 on
    /// every interface.
    pub fn listen_addr(&self) -> Cow<'_, str> {
        if self.addr.is_empty() {
            Cow::Borrowed("0.0.0.0:80")
        } else if self.addr.starts_with(':') {
            Cow::Owned(format!("0.0.0.0{}", self.addr))
        } else {
            Cow::Borrowed(&self.addr)
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(":80")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServiceConfig::new("127.0.0.1:3000");
        assert_eq!(config.header_read_timeout(), Duration::from_millis(200));
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
    }

    #[test]
    fn empty_host_means_all_interfaces() {
        let config = ServiceConfig::new(":8080");
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");

        assert_eq!(ServiceConfig::new("").listen_addr(), "0.0.0.0:80");
        assert_eq!(ServiceConfig::default().listen_addr(), "0.0.0.0:80");
    }

    #[test]
    fn explicit_host_is_untouched() {
        let config = ServiceConfig::new("localhost:9000")
            .with_header_read_timeout(Duration::from_secs(1))
            .with_shutdown_grace(Duration::from_millis(750));
        assert_eq!(config.listen_addr(), "localhost:9000");
        assert_eq!(config.header_read_timeout(), Duration::from_secs(1));
        assert_eq!(config.shutdown_grace(), Duration::from_millis(750));
    }
}
