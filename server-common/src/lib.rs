//! Shared HTTP bootstrap for the MCP servers in this workspace.
//!
//! Binaries flatten `CliArgs` into their own parser, build a `pmcp::Server`
//! and hand both to `run_http()`.

use pmcp::server::streamable_http_server::{StreamableHttpServer, StreamableHttpServerConfig};
use pmcp::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// CLI arguments shared across all MCP servers.
#[derive(Debug, Clone, clap::Args)]
pub struct CliArgs {
    /// Host to bind to
    #[clap(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind to
    #[clap(long, default_value = "3100")]
    pub port: u16,
}

impl CliArgs {
    /// Socket address the HTTP transport binds to.
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("invalid bind address {}:{}: {}", self.host, self.port, e))?;
        Ok(addr)
    }
}

/// Run an MCP server over Streamable HTTP transport until the listener exits.
pub async fn run_http(server: Server, args: &CliArgs) -> anyhow::Result<()> {
    let addr = args.bind_addr()?;

    tracing::info!(host = %args.host, port = args.port, "Starting MCP HTTP server");

    let server = Arc::new(Mutex::new(server));

    let config = StreamableHttpServerConfig {
        session_id_generator: None,
        enable_json_response: true,
        event_store: None,
        on_session_initialized: None,
        on_session_closed: None,
        http_middleware: None,
    };

    let http_server = StreamableHttpServer::with_config(addr, server, config);
    let (bound_addr, server_handle) = http_server.start().await?;

    tracing::info!(addr = %bound_addr, "MCP server listening on http://{}/mcp", bound_addr);

    server_handle.await?;

    Ok(())
}

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG`, falling back to `info`. Calling this more
/// than once is harmless; later calls leave the first subscriber in place.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
