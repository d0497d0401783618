//! Tab management: list, open and switch tabs.

use super::{Capability, ToolOutput, ToolResult, ToolSchema, ToolType};
use crate::browser::{BrowserManager, TabInfo};
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub const LIST_SCHEMA: ToolSchema = ToolSchema {
    name: "browser_tab_list",
    title: "List tabs",
    description: "List browser tabs with their indices, titles and URLs",
    capability: Capability::Tabs,
    tool_type: ToolType::ReadOnly,
};

pub const NEW_SCHEMA: ToolSchema = ToolSchema {
    name: "browser_tab_new",
    title: "Open a new tab",
    description: "Open a new tab, optionally at a URL, and make it the current tab",
    capability: Capability::Tabs,
    tool_type: ToolType::ReadOnly,
};

pub const SELECT_SCHEMA: ToolSchema = ToolSchema {
    name: "browser_tab_select",
    title: "Select a tab",
    description: "Make the tab at the given index the current tab",
    capability: Capability::Tabs,
    tool_type: ToolType::ReadOnly,
};

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct TabListInput {}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct TabNewInput {
    /// URL to open (default: about:blank)
    #[schemars(description = "The URL to open in the new tab. Defaults to about:blank")]
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct TabSelectInput {
    #[schemars(description = "Index of the tab to select (use browser_tab_list to see indices)")]
    pub index: usize,
}

pub async fn handle_list(manager: &Arc<BrowserManager>, input: TabListInput) -> Result<ToolResult, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let m = manager.clone();
    let action = Box::pin(async move {
        match m.list_tabs().await {
            Ok(tabs) => ToolOutput::text(render_tabs(&tabs)),
            Err(e) => ToolOutput::text(format!("Error listing tabs:\n{:#}", e)),
        }
    });

    Ok(ToolResult {
        code: vec!["// <internal code to list tabs>".to_string()],
        action,
        capture_snapshot: false,
        wait_for_network: false,
    })
}

pub async fn handle_new(manager: &Arc<BrowserManager>, input: TabNewInput) -> Result<ToolResult, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let url = input.url.unwrap_or_else(|| "about:blank".to_string());
    let m = manager.clone();
    let code = vec![format!("// <internal code to open a new tab at {}>", url)];

    let action = Box::pin(async move {
        let opened = m.new_tab(&url).await;
        match opened {
            Ok(_) => match m.list_tabs().await {
                Ok(tabs) => ToolOutput::text(render_tabs(&tabs)),
                Err(e) => ToolOutput::text(format!("Opened {}, but listing tabs failed:\n{:#}", url, e)),
            },
            Err(e) => ToolOutput::text(format!("Error opening tab:\n{:#}", e)),
        }
    });

    Ok(ToolResult {
        code,
        action,
        capture_snapshot: false,
        wait_for_network: false,
    })
}

pub async fn handle_select(
    manager: &Arc<BrowserManager>,
    input: TabSelectInput,
) -> Result<ToolResult, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    manager
        .select_tab(input.index)
        .await
        .map_err(|e| Error::validation(format!("Failed to select tab: {}", e)))?;

    let m = manager.clone();
    let action = Box::pin(async move {
        match m.list_tabs().await {
            Ok(tabs) => ToolOutput::text(render_tabs(&tabs)),
            Err(e) => ToolOutput::text(format!("Error listing tabs:\n{:#}", e)),
        }
    });

    Ok(ToolResult {
        code: vec![format!("// <internal code to select tab {}>", input.index)],
        action,
        capture_snapshot: false,
        wait_for_network: false,
    })
}

/// Markdown list of tabs, one line per tab.
pub fn render_tabs(tabs: &[TabInfo]) -> String {
    if tabs.is_empty() {
        return "No open tabs. Use browser_navigate to open one.".to_string();
    }

    let lines: Vec<String> = tabs
        .iter()
        .map(|tab| {
            format!(
                "- {}:{} [{}] ({})",
                tab.index,
                if tab.current { " (current)" } else { "" },
                tab.title,
                tab.url
            )
        })
        .collect();

    format!("### Open tabs\n{}", lines.join("\n"))
}
