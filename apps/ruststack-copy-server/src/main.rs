//! RustStack Copy Server - object storage with server-side copy.
//!
//! This binary serves an in-memory object store behind the server-side copy
//! layer from `ruststack-copy-core`. Objects are addressed as
//! `/v1/<account>/<container>/<object>`; `COPY`, `PUT` with `X-Copy-From`, and
//! (unless disabled) `POST` are turned into server-side copies.
//!
//! # Usage
//!
//! ```text
//! GATEWAY_LISTEN=0.0.0.0:8080 ruststack-copy-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `OBJECT_POST_AS_COPY` | *(unset)* | Translate object POSTs into self-copies |
//! | `PROXY_CONFIG_PATH` | *(unset)* | Legacy proxy config consulted for `object_post_as_copy` |
//! | `MAX_OBJECT_SIZE` | `5368709122` | Largest source object that may be copied |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod gateway;
mod memory;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ruststack_copy_core::service::ObjectService;
use ruststack_copy_core::{CopyConfig, ServerSideCopy};

use crate::gateway::{Gateway, HEALTH_CHECK_PATH};
use crate::memory::MemoryStore;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global `fmt` subscriber; `RUST_LOG` overrides `LOG_LEVEL`.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Build the request pipeline: the copy layer in front of the in-memory store.
fn build_gateway(config: &CopyConfig) -> Gateway<ServerSideCopy<MemoryStore>> {
    Gateway::new(ServerSideCopy::new(MemoryStore::new(), config.clone()))
}

/// Accept connections until Ctrl-C, then drain the ones still open.
async fn serve<S: ObjectService>(listener: TcpListener, service: Gateway<S>) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("ctrl-c received, no longer accepting copies");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Ask a running server for `/healthcheck` over a plain TCP connection.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request =
        format!("GET {HEALTH_CHECK_PATH} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    let status_ok = response
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        == Some("200");
    anyhow::ensure!(
        status_ok && response.contains("\"status\":\"running\""),
        "unhealthy response from {addr}"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = CopyConfig::from_env();

    // Exit status 0 when a local server answers `/healthcheck`.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level)?;

    info!(
        gateway_listen = %config.gateway_listen,
        object_post_as_copy = config.object_post_as_copy,
        max_object_size = config.max_object_size,
        proxy_config_path = ?config.proxy_config_path,
        version = VERSION,
        "starting object copy server",
    );

    let service = build_gateway(&config);

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_build_gateway_from_config() {
        let config = CopyConfig::builder().object_post_as_copy(false).build();
        let gateway = build_gateway(&config);
        assert!(!gateway.inner().config().object_post_as_copy);
        assert_eq!(gateway.inner().config().max_object_size, config.max_object_size);
    }

    #[tokio::test]
    async fn test_should_pass_health_check_against_running_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(serve(listener, build_gateway(&CopyConfig::default())));

        run_health_check(&addr.to_string())
            .await
            .expect("server should be healthy");

        server.abort();
    }

    #[tokio::test]
    async fn test_should_fail_health_check_without_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        assert!(run_health_check(&addr.to_string()).await.is_err());
    }
}
