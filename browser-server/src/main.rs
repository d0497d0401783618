//! Browser Automation MCP Server binary.
//!
//! Serves `browser_evaluate` and friends over Streamable HTTP until Ctrl+C,
//! then closes the browser.

use clap::Parser;
use mcp_browser_core::browser::BrowserManagerConfig;
use mcp_browser_core::tools::Capability;

#[derive(Parser)]
#[command(name = "browser-server", about = "Browser Automation MCP Server")]
struct Cli {
    #[clap(flatten)]
    server: server_common::CliArgs,

    /// Custom Chrome/Edge binary path
    #[clap(long)]
    browser_path: Option<String>,

    /// Connect to already-running browser via CDP URL
    #[clap(long)]
    cdp_url: Option<String>,

    /// Run browser in headless mode
    #[clap(long, default_value_t = true, action = clap::ArgAction::Set)]
    headless: bool,

    /// Extra tool groups to enable, comma separated (e.g. "tabs")
    #[clap(long, value_delimiter = ',')]
    caps: Vec<Capability>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    server_common::init_logging();

    let config = BrowserManagerConfig {
        browser_path: cli.browser_path,
        cdp_url: cli.cdp_url,
        headless: cli.headless,
        window_size: (1280, 720),
    };

    let (server, manager) = mcp_browser_core::build_server(config, &cli.caps)?;

    tokio::select! {
        result = server_common::run_http(server, &cli.server) => {
            manager.shutdown().await;
            result
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received — shutting down browser");
            manager.shutdown().await;
            Ok(())
        }
    }
}
