//! Execute arbitrary JavaScript in the current tab.

use super::{Capability, ToolOutput, ToolResult, ToolSchema, ToolType};
use crate::browser::BrowserManager;
use crate::page::{EvalValue, EvaluateError, PageEvaluator};
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub const SCHEMA: ToolSchema = ToolSchema {
    name: "browser_evaluate",
    title: "Evaluate JavaScript",
    description: "Execute JavaScript code in the browser context and return the result",
    capability: Capability::Core,
    tool_type: ToolType::Destructive,
};

/// Preview length in UTF-16 code units, as the page counts string length.
const CODE_PREVIEW_UNITS: usize = 100;

pub const OBJECT_OR_FUNCTION: &str = "[Object or Function]";
pub const NON_SERIALIZABLE: &str = "[Circular reference or non-serializable object]";

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateInput {
    /// JavaScript code to execute in the page context
    #[validate(length(min = 1))]
    #[schemars(description = "The JavaScript expression or code to execute")]
    pub expression: String,

    /// Await the result when it is a Promise (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Whether to await the result if it's a Promise. Defaults to true")]
    pub await_promise: Option<bool>,
}

impl EvaluateInput {
    fn awaits(&self) -> bool {
        self.await_promise != Some(false)
    }
}

pub async fn handle(manager: &Arc<BrowserManager>, input: EvaluateInput) -> Result<ToolResult, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let tab = manager
        .current_tab_or_die()
        .await
        .map_err(|e| Error::internal(e.to_string()))?;

    Ok(prepare(tab.evaluator(), input))
}

/// Build the result for evaluating `input` against `page`.
pub fn prepare(page: Arc<dyn PageEvaluator>, input: EvaluateInput) -> ToolResult {
    let code = code_lines(&input.expression);

    let action = Box::pin(async move {
        let text = match evaluate(page.as_ref(), &input).await {
            Ok(value) => format!("Evaluation result:\n{}", format_result(&value)),
            Err(e) => {
                tracing::debug!(error = %e, "Script evaluation failed");
                format!("Error executing JavaScript:\n{}", e)
            }
        };
        ToolOutput::text(text)
    });

    ToolResult {
        code,
        action,
        capture_snapshot: false,
        wait_for_network: false,
    }
}

async fn evaluate(page: &dyn PageEvaluator, input: &EvaluateInput) -> Result<EvalValue, EvaluateError> {
    if input.awaits() {
        return page.evaluate(&input.expression).await;
    }

    let handle = page.evaluate_handle(&input.expression).await?;
    Ok(handle.json_value().await.unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Handle could not be resolved to a value");
        EvalValue::Primitive(OBJECT_OR_FUNCTION.to_string())
    }))
}

/// Render an evaluation result as display text.
pub fn format_result(value: &EvalValue) -> String {
    match value {
        EvalValue::Undefined => "undefined".to_string(),
        EvalValue::Null => "null".to_string(),
        EvalValue::Primitive(s) => s.clone(),
        EvalValue::Object(json) => json.clone(),
        EvalValue::Unserializable => NON_SERIALIZABLE.to_string(),
    }
}

fn code_lines(expression: &str) -> Vec<String> {
    let mut preview = String::new();
    let mut units = 0;
    for c in expression.chars() {
        units += c.len_utf16();
        // A surrogate pair straddling the limit is dropped whole.
        if units > CODE_PREVIEW_UNITS {
            break;
        }
        preview.push(c);
    }
    if expression.encode_utf16().count() > CODE_PREVIEW_UNITS {
        preview.push_str("...");
    }
    let quoted = serde_json::Value::String(expression.to_string()).to_string();

    vec![
        format!("// Evaluate JavaScript expression: {}", preview),
        format!("const result = await page.evaluate({});", quoted),
    ]
}
