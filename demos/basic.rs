//! Minimal lifeline example: one service, stopped by SIGTERM / Ctrl-C.
//!
//! Run with:
//!   RUST_LOG=lifeline=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/hello
//!   curl http://localhost:3000/whoami
//!   curl http://localhost:3000/slow &   # then hit Ctrl-C: the request still completes
//!   printf 'GET / HTTP/1.1\r\n' | nc -q 5 localhost 3000   # cut off after 200ms

use std::time::Duration;

use lifeline::{CancellationToken, Describe, HttpService, Request, Response, ServiceConfig, signal};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let token = CancellationToken::new();
    signal::cancel_on_shutdown_signal(token.clone());

    let config = ServiceConfig::new(":3000").with_shutdown_grace(Duration::from_secs(10));
    let service = HttpService::new(config, app).named("demo");
    let name = service.describe();

    if let Err(e) = service.run(token).await {
        eprintln!("{name}: {e}");
        std::process::exit(1);
    }
}

async fn app(req: Request) -> Response {
    match req.path() {
        "/slow" => {
            // Keeps going through shutdown; the drain waits for it.
            tokio::time::sleep(Duration::from_secs(3)).await;
            Response::text("finished despite shutdown")
        }
        "/whoami" => Response::text(req.peer_addr().to_string()),
        path => Response::json(format!(r#"{{"path":"{path}"}}"#)),
    }
}
