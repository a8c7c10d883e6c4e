//! Byte-sink adapter over a tracing span.
//!
//! The serve loop reports transport trouble (malformed requests, resets, header
//! timeouts, accept failures) by writing a line into an [`std::io::Write`].
//! [`ErrorLog`] turns each of those writes into one error event in the
//! service's span, so they land in the same structured stream as the lifecycle
//! events instead of on stderr.

use std::io;

use tracing::Span;

/// Presents a [`Span`] as an infallible [`io::Write`].
///
/// Every `write` call is one `error`-level event whose message is the written
/// text, verbatim. Writers should format a whole line first and hand it over in
/// a single `write_all`, otherwise one diagnostic becomes several events.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    span: Span,
}

impl ErrorLog {
    pub fn new(span: Span) -> Self {
        Self { span }
    }
}

impl io::Write for ErrorLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        self.span.in_scope(|| tracing::error!("{text}"));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
