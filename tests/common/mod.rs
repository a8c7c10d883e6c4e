//! Shared utilities for lifecycle tests.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use lifeline::{CancellationToken, Error, HttpService};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::subscriber::DefaultGuard;

/// Runs `service` on an ephemeral loopback port.
pub async fn spawn_service(
    service: HttpService,
) -> (SocketAddr, CancellationToken, JoinHandle<Result<(), Error>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let token = CancellationToken::new();
    let handle = tokio::spawn(service.serve(listener, token.clone()));
    (addr, token, handle)
}

/// In-memory log output of a `tracing-subscriber` fmt layer.
///
/// The subscriber is thread-local, which covers every task on the
/// current-thread runtime `#[tokio::test]` uses.
#[derive(Clone, Default)]
pub struct Logs(Arc<Mutex<Vec<u8>>>);

impl Logs {
    pub fn install() -> (Self, DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Byte offset of the first line containing `needle`.
    pub fn position(&self, needle: &str) -> usize {
        let text = self.text();
        text.find(needle)
            .unwrap_or_else(|| panic!("`{needle}` not logged:\n{text}"))
    }
}

impl io::Write for Logs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
