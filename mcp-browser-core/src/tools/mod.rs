//! Tool definitions and registration.
//!
//! Every tool declares a static `ToolSchema` and a `handle` function. The
//! handle checks preconditions and returns a `ToolResult`; the deferred
//! `action` in that result does the actual browser work and always yields a
//! `ToolOutput`, so page-level failures reach the caller as text.

pub mod evaluate;
pub mod navigate;
pub mod tabs;

use crate::browser::BrowserManager;
use futures::future::BoxFuture;
use pmcp::{Error, TypedTool};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Feature group a tool belongs to. `Core` tools are always registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Core,
    Tabs,
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "core" => Ok(Capability::Core),
            "tabs" => Ok(Capability::Tabs),
            other => Err(format!("unknown capability '{}' (expected: core, tabs)", other)),
        }
    }
}

/// Whether a tool only reads page state or may change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolType {
    ReadOnly,
    Destructive,
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolType::ReadOnly => f.write_str("readOnly"),
            ToolType::Destructive => f.write_str("destructive"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSchema {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub capability: Capability,
    pub tool_type: ToolType,
}

impl ToolSchema {
    /// Description advertised to clients, tagged with the effect classification.
    pub fn describe(&self) -> String {
        format!("{}: {} [{}]", self.title, self.description, self.tool_type)
    }

    pub fn is_enabled(&self, capabilities: &[Capability]) -> bool {
        self.capability == Capability::Core || capabilities.contains(&self.capability)
    }
}

/// One block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    pub content: Vec<Content>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
        }
    }
}

/// What a tool handler hands back to the dispatcher.
pub struct ToolResult {
    /// Pseudo-code describing the action, for logs and transcripts.
    pub code: Vec<String>,
    pub action: BoxFuture<'static, ToolOutput>,
    /// Whether a page snapshot should be taken after the action.
    pub capture_snapshot: bool,
    /// Whether the dispatcher should let network activity settle afterwards.
    pub wait_for_network: bool,
}

/// Run a tool's deferred action.
pub async fn execute(schema: &ToolSchema, result: ToolResult) -> ToolOutput {
    tracing::debug!(
        tool = schema.name,
        code = %result.code.join("\n"),
        capture_snapshot = result.capture_snapshot,
        wait_for_network = result.wait_for_network,
        "Running tool action"
    );
    let output = result.action.await;
    tracing::debug!(tool = schema.name, blocks = output.content.len(), "Tool action finished");
    output
}

/// Run a tool's action and encode its output for the MCP response.
pub async fn run(schema: &ToolSchema, result: ToolResult) -> Result<serde_json::Value, Error> {
    let output = execute(schema, result).await;
    serde_json::to_value(&output)
        .map_err(|e| Error::internal(format!("Failed to encode tool output: {}", e)))
}

/// Every tool known to the server.
pub const ALL_TOOLS: [&ToolSchema; 5] = [
    &evaluate::SCHEMA,
    &navigate::SCHEMA,
    &tabs::LIST_SCHEMA,
    &tabs::NEW_SCHEMA,
    &tabs::SELECT_SCHEMA,
];

/// Names of the tools registered for the given capabilities.
pub fn enabled_tools(capabilities: &[Capability]) -> Vec<&'static str> {
    ALL_TOOLS
        .iter()
        .filter(|schema| schema.is_enabled(capabilities))
        .map(|schema| schema.name)
        .collect()
}

/// Register all enabled browser tools onto the server builder.
///
/// Each tool captures an `Arc<BrowserManager>` for browser access.
pub fn register_tools(
    builder: pmcp::ServerBuilder,
    manager: Arc<BrowserManager>,
    capabilities: &[Capability],
) -> pmcp::ServerBuilder {
    let mut builder = builder;

    // --- Core ---

    if evaluate::SCHEMA.is_enabled(capabilities) {
        let m = manager.clone();
        builder = builder.tool(
            evaluate::SCHEMA.name,
            TypedTool::new(
                evaluate::SCHEMA.name,
                move |input: evaluate::EvaluateInput, _extra| {
                    let m = m.clone();
                    Box::pin(async move {
                        let result = evaluate::handle(&m, input).await?;
                        run(&evaluate::SCHEMA, result).await
                    })
                },
            )
            .with_description(evaluate::SCHEMA.describe()),
        );
    }

    if navigate::SCHEMA.is_enabled(capabilities) {
        let m = manager.clone();
        builder = builder.tool(
            navigate::SCHEMA.name,
            TypedTool::new(
                navigate::SCHEMA.name,
                move |input: navigate::NavigateInput, _extra| {
                    let m = m.clone();
                    Box::pin(async move {
                        let result = navigate::handle(&m, input).await?;
                        run(&navigate::SCHEMA, result).await
                    })
                },
            )
            .with_description(navigate::SCHEMA.describe()),
        );
    }

    // --- Tabs ---

    if tabs::LIST_SCHEMA.is_enabled(capabilities) {
        let m = manager.clone();
        builder = builder.tool(
            tabs::LIST_SCHEMA.name,
            TypedTool::new(
                tabs::LIST_SCHEMA.name,
                move |input: tabs::TabListInput, _extra| {
                    let m = m.clone();
                    Box::pin(async move {
                        let result = tabs::handle_list(&m, input).await?;
                        run(&tabs::LIST_SCHEMA, result).await
                    })
                },
            )
            .with_description(tabs::LIST_SCHEMA.describe()),
        );
    }

    if tabs::NEW_SCHEMA.is_enabled(capabilities) {
        let m = manager.clone();
        builder = builder.tool(
            tabs::NEW_SCHEMA.name,
            TypedTool::new(
                tabs::NEW_SCHEMA.name,
                move |input: tabs::TabNewInput, _extra| {
                    let m = m.clone();
                    Box::pin(async move {
                        let result = tabs::handle_new(&m, input).await?;
                        run(&tabs::NEW_SCHEMA, result).await
                    })
                },
            )
            .with_description(tabs::NEW_SCHEMA.describe()),
        );
    }

    if tabs::SELECT_SCHEMA.is_enabled(capabilities) {
        let m = manager;
        builder = builder.tool(
            tabs::SELECT_SCHEMA.name,
            TypedTool::new(
                tabs::SELECT_SCHEMA.name,
                move |input: tabs::TabSelectInput, _extra| {
                    let m = m.clone();
                    Box::pin(async move {
                        let result = tabs::handle_select(&m, input).await?;
                        run(&tabs::SELECT_SCHEMA, result).await
                    })
                },
            )
            .with_description(tabs::SELECT_SCHEMA.describe()),
        );
    }

    builder
}
