//! Stdio and streamable-HTTP transports for [`PbiMcpServer`].

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context as _;
use axum::routing::get;
use rmcp::ServiceExt;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::server::PbiMcpServer;

/// Path the MCP endpoint is mounted on.
pub const MCP_PATH: &str = "/mcp";

/// Serves one client over stdin/stdout until it disconnects.
///
/// Logs go to stderr; stdout carries only protocol messages.
///
/// # Errors
///
/// Returns an error if the handshake fails or the session ends abnormally.
pub async fn serve_stdio(server: PbiMcpServer) -> anyhow::Result<()> {
    info!("MCP server on stdio");
    let service = server.serve(stdio()).await?;
    let reason = service.waiting().await?;
    info!(reason = ?reason, "MCP stdio session closed");
    Ok(())
}

/// Serves MCP over streamable HTTP at [`MCP_PATH`] until Ctrl-C.
///
/// Sessions are independent; all of them share the orchestrator behind
/// `server`. A plain `GET /healthz` answers `ok` for load balancers.
///
/// # Errors
///
/// Returns an error if the address is invalid, the port cannot be bound or
/// the server fails while running.
pub async fn serve_http(server: PbiMcpServer, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = bind_address(host, port)?;
    let shutdown = CancellationToken::new();

    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            cancellation_token: shutdown.child_token(),
            ..Default::default()
        },
    );

    let router = axum::Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .nest_service(MCP_PATH, service);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(url = %format!("http://{addr}{MCP_PATH}"), "MCP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down MCP server");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

fn bind_address(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let ip: IpAddr = if host == "localhost" {
        IpAddr::from([127, 0, 0, 1])
    } else {
        host.parse()
            .map_err(|_| anyhow::anyhow!("invalid bind host '{host}'"))?
    };
    Ok(SocketAddr::new(ip, port))
}
