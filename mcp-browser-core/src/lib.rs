//! Browser automation MCP server core library.
//!
//! Provides `build_server()` which constructs an MCP `Server` exposing
//! JavaScript evaluation and tab tools over a CDP-controlled browser.

pub mod browser;
pub mod page;
pub mod tools;

use browser::{BrowserManager, BrowserManagerConfig};
use pmcp::types::{ServerCapabilities, ToolCapabilities};
use pmcp::Server;
use std::sync::Arc;
use tools::Capability;

/// Build the MCP server plus the browser manager backing its tools.
///
/// The manager is returned so the caller can shut the browser down on exit.
pub fn build_server(
    config: BrowserManagerConfig,
    capabilities: &[Capability],
) -> pmcp::Result<(Server, Arc<BrowserManager>)> {
    let manager = Arc::new(BrowserManager::new(config));

    let builder = Server::builder()
        .name("browser")
        .version(env!("CARGO_PKG_VERSION"))
        .capabilities(ServerCapabilities {
            tools: Some(ToolCapabilities {
                list_changed: Some(true),
            }),
            ..Default::default()
        });

    let builder = tools::register_tools(builder, manager.clone(), capabilities);

    tracing::debug!(tools = ?tools::enabled_tools(capabilities), "Registered browser tools");

    Ok((builder.build()?, manager))
}
