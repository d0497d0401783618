//! Navigate the current tab to a URL.

use super::{Capability, ToolOutput, ToolResult, ToolSchema, ToolType};
use crate::browser::BrowserManager;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

pub const SCHEMA: ToolSchema = ToolSchema {
    name: "browser_navigate",
    title: "Navigate to a URL",
    description: "Navigate the current tab to a URL, opening a tab first if none exists",
    capability: Capability::Core,
    tool_type: ToolType::Destructive,
};

fn default_timeout_ms() -> u64 {
    30000
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct NavigateInput {
    /// URL to navigate to
    #[validate(length(min = 1))]
    #[schemars(description = "The URL to navigate to")]
    pub url: String,

    /// Navigation timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1000, max = 120000))]
    #[schemars(description = "Navigation timeout in milliseconds (default: 30000)")]
    pub timeout_ms: u64,
}

pub async fn handle(manager: &Arc<BrowserManager>, input: NavigateInput) -> Result<ToolResult, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let tab = manager
        .ensure_tab()
        .await
        .map_err(|e| Error::internal(format!("Browser error: {}", e)))?;

    let code = vec![
        format!("// Navigate to {}", input.url),
        format!(
            "await page.goto({});",
            serde_json::Value::String(input.url.clone())
        ),
    ];

    let page = tab.page().clone();
    let action = Box::pin(async move {
        let timeout = Duration::from_millis(input.timeout_ms);
        let navigated = tokio::time::timeout(timeout, page.goto(input.url.clone())).await;
        let text = match navigated {
            Err(_) => format!(
                "Error navigating:\nTimed out after {}ms loading {}",
                input.timeout_ms, input.url
            ),
            Ok(Err(e)) => format!("Error navigating:\n{}", e),
            Ok(Ok(_)) => {
                let final_url = page.url().await.ok().flatten().unwrap_or(input.url);
                tracing::info!(url = %final_url, "Navigated");
                format!("Navigated to {}", final_url)
            }
        };
        ToolOutput::text(text)
    });

    Ok(ToolResult {
        code,
        action,
        capture_snapshot: false,
        wait_for_network: true,
    })
}
