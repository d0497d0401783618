//! Script evaluation inside a page context.
//!
//! `PageEvaluator` is the seam between tools and the browser: tools only see
//! `EvalValue`s, never raw CDP remote objects. `CdpPage` implements it on top
//! of the `Runtime` domain.

use async_trait::async_trait;
use chromiumoxide::cdp::js_protocol::runtime::{
    CallFunctionOnParams, EvaluateParams, ExceptionDetails, ReleaseObjectParams, RemoteObject,
    RemoteObjectId, RemoteObjectSubtype, RemoteObjectType,
};
use chromiumoxide::Page;
use serde_json::{Number, Value};

/// Pretty-prints the receiver inside the page, two-space indent.
const STRINGIFY_THIS: &str = "function() { return JSON.stringify(this, null, 2); }";

/// A value produced by evaluating script in the page.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Undefined,
    Null,
    /// Any non-object value, already in its `String(v)` form.
    Primitive(String),
    /// An object or array, as `JSON.stringify(v, null, 2)` text.
    Object(String),
    /// An object that could not be serialized (cycles, host objects).
    Unserializable,
}

impl EvalValue {
    /// Classify a plain JSON value.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => EvalValue::Null,
            Value::Bool(b) => EvalValue::Primitive(b.to_string()),
            Value::Number(n) => EvalValue::Primitive(number_to_js_string(&n)),
            Value::String(s) => EvalValue::Primitive(s),
            v @ (Value::Array(_) | Value::Object(_)) => serde_json::to_string_pretty(&v)
                .map(EvalValue::Object)
                .unwrap_or(EvalValue::Unserializable),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    /// The script threw, or the awaited promise rejected.
    #[error("{0}")]
    Exception(String),
    #[error("{0}")]
    Protocol(String),
    #[error("value is not serializable: {0}")]
    NotSerializable(String),
}

impl From<chromiumoxide::error::CdpError> for EvaluateError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        EvaluateError::Protocol(e.to_string())
    }
}

/// Something that can run script in a live page.
#[async_trait]
pub trait PageEvaluator: Send + Sync {
    /// Evaluate `expression`, awaiting the result if it is a promise.
    async fn evaluate(&self, expression: &str) -> Result<EvalValue, EvaluateError>;

    /// Evaluate `expression` without awaiting, keeping the result in the page.
    async fn evaluate_handle(&self, expression: &str) -> Result<Box<dyn JsHandle>, EvaluateError>;
}

/// Reference to a value that still lives in the page.
#[async_trait]
pub trait JsHandle: Send + Sync {
    /// Copy the referenced value out of the page.
    async fn json_value(&self) -> Result<EvalValue, EvaluateError>;
}

/// `PageEvaluator` backed by a chromiumoxide page.
#[derive(Debug, Clone)]
pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    async fn run(&self, expression: &str, await_promise: bool) -> Result<RemoteObject, EvaluateError> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(await_promise)
            .return_by_value(false)
            .user_gesture(true)
            .build()
            .map_err(EvaluateError::Protocol)?;

        let returns = self.page.execute(params).await?.result;
        if let Some(details) = returns.exception_details {
            if let Some(id) = returns.result.object_id.clone() {
                release(&self.page, id).await;
            }
            return Err(EvaluateError::Exception(exception_message(&details)));
        }
        Ok(returns.result)
    }
}

#[async_trait]
impl PageEvaluator for CdpPage {
    async fn evaluate(&self, expression: &str) -> Result<EvalValue, EvaluateError> {
        let remote = self.run(expression, true).await?;

        let value = match remote.object_id.clone() {
            Some(id) if is_serializable_object(&remote) => {
                let value = match stringify(&self.page, id.clone()).await {
                    Ok(value) => EvalValue::Object(value),
                    Err(e) => {
                        tracing::debug!(error = %e, "result object could not be serialized");
                        EvalValue::Unserializable
                    }
                };
                release(&self.page, id).await;
                value
            }
            Some(id) => {
                release(&self.page, id).await;
                classify_primitive(&remote)
            }
            None => classify_primitive(&remote),
        };

        Ok(value)
    }

    async fn evaluate_handle(&self, expression: &str) -> Result<Box<dyn JsHandle>, EvaluateError> {
        let remote = self.run(expression, false).await?;
        Ok(Box::new(CdpHandle {
            page: self.page.clone(),
            remote,
        }))
    }
}

struct CdpHandle {
    page: Page,
    remote: RemoteObject,
}

#[async_trait]
impl JsHandle for CdpHandle {
    async fn json_value(&self) -> Result<EvalValue, EvaluateError> {
        if self.remote.r#type == RemoteObjectType::Function {
            return Err(EvaluateError::NotSerializable("function".to_string()));
        }

        match self.remote.object_id.clone() {
            Some(id) if is_serializable_object(&self.remote) => {
                let value = stringify(&self.page, id).await?;
                Ok(EvalValue::Object(value))
            }
            _ => Ok(classify_primitive(&self.remote)),
        }
    }
}

impl Drop for CdpHandle {
    fn drop(&mut self) {
        let Some(id) = self.remote.object_id.take() else {
            return;
        };
        let page = self.page.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move { release(&page, id).await });
        }
    }
}

fn is_serializable_object(remote: &RemoteObject) -> bool {
    remote.r#type == RemoteObjectType::Object && remote.subtype != Some(RemoteObjectSubtype::Null)
}

/// Serialize an in-page object with `JSON.stringify`. The text is kept as is.
async fn stringify(page: &Page, object_id: RemoteObjectId) -> Result<String, EvaluateError> {
    let params = CallFunctionOnParams::builder()
        .function_declaration(STRINGIFY_THIS)
        .object_id(object_id)
        .return_by_value(true)
        .build()
        .map_err(EvaluateError::Protocol)?;

    let returns = page.execute(params).await?.result;
    if let Some(details) = returns.exception_details {
        return Err(EvaluateError::NotSerializable(exception_message(&details)));
    }

    match returns.result.value {
        Some(Value::String(json)) => Ok(json),
        _ => Err(EvaluateError::NotSerializable(
            "JSON.stringify produced no output".to_string(),
        )),
    }
}

async fn release(page: &Page, object_id: RemoteObjectId) {
    if let Err(e) = page.execute(ReleaseObjectParams::new(object_id)).await {
        tracing::trace!(error = %e, "failed to release remote object");
    }
}

/// Map a non-object remote value to its `String(v)` form.
pub(crate) fn classify_primitive(remote: &RemoteObject) -> EvalValue {
    match remote.r#type {
        RemoteObjectType::Undefined | RemoteObjectType::Function => EvalValue::Undefined,
        RemoteObjectType::Object if remote.subtype == Some(RemoteObjectSubtype::Null) => {
            EvalValue::Null
        }
        RemoteObjectType::Number => {
            let text = remote
                .unserializable_value
                .as_ref()
                .map(|v| v.inner().clone())
                .or_else(|| remote.description.clone());
            match (text, &remote.value) {
                (Some(text), _) if text == "-0" => EvalValue::Primitive("0".to_string()),
                (Some(text), _) => EvalValue::Primitive(text),
                (None, Some(Value::Number(n))) => EvalValue::Primitive(number_to_js_string(n)),
                (None, _) => EvalValue::Primitive("NaN".to_string()),
            }
        }
        RemoteObjectType::Bigint => {
            let raw = remote
                .unserializable_value
                .as_ref()
                .map(|v| v.inner().clone())
                .or_else(|| remote.description.clone())
                .unwrap_or_default();
            EvalValue::Primitive(raw.trim_end_matches('n').to_string())
        }
        RemoteObjectType::Symbol => {
            EvalValue::Primitive(remote.description.clone().unwrap_or_default())
        }
        _ => match &remote.value {
            Some(value) => EvalValue::from_json(value.clone()),
            None => EvalValue::Primitive(remote.description.clone().unwrap_or_default()),
        },
    }
}

/// Human-readable message for a thrown value.
pub(crate) fn exception_message(details: &ExceptionDetails) -> String {
    let Some(exception) = &details.exception else {
        return details.text.clone();
    };

    if exception.subtype == Some(RemoteObjectSubtype::Error) {
        if let Some(description) = &exception.description {
            return error_message(description, exception.class_name.as_deref());
        }
    }

    match &exception.value {
        Some(Value::String(s)) => s.clone(),
        Some(value) => match EvalValue::from_json(value.clone()) {
            EvalValue::Primitive(s) => s,
            EvalValue::Null => "null".to_string(),
            _ => value.to_string(),
        },
        None => match classify_primitive(exception) {
            EvalValue::Primitive(s) if exception.r#type != RemoteObjectType::Object => s,
            EvalValue::Undefined if exception.r#type == RemoteObjectType::Undefined => {
                "undefined".to_string()
            }
            _ => exception
                .description
                .clone()
                .unwrap_or_else(|| details.text.clone()),
        },
    }
}

/// Strip the stack trace and `Name: ` prefix from an error description.
fn error_message(description: &str, class_name: Option<&str>) -> String {
    let head = match description.find("\n    at ") {
        Some(idx) => &description[..idx],
        None => description,
    };

    if let Some(class) = class_name {
        if head == class {
            return String::new();
        }
        if let Some(rest) = head.strip_prefix(class).and_then(|r| r.strip_prefix(": ")) {
            return rest.to_string();
        }
    }

    match head.split_once(": ") {
        Some((name, rest)) if !name.contains(char::is_whitespace) => rest.to_string(),
        _ => head.to_string(),
    }
}

/// Format a JSON number the way JavaScript's `String()` does for common values.
pub(crate) fn number_to_js_string(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
        _ => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn remote(value: Value) -> RemoteObject {
        serde_json::from_value(value).expect("remote object")
    }

    fn details(value: Value) -> ExceptionDetails {
        serde_json::from_value(value).expect("exception details")
    }

    #[test]
    fn test_from_json_classification() {
        assert_eq!(EvalValue::from_json(Value::Null), EvalValue::Null);
        assert_eq!(
            EvalValue::from_json(json!(true)),
            EvalValue::Primitive("true".into())
        );
        assert_eq!(
            EvalValue::from_json(json!("hi")),
            EvalValue::Primitive("hi".into())
        );
        assert_eq!(
            EvalValue::from_json(json!([1, 2])),
            EvalValue::Object("[\n  1,\n  2\n]".into())
        );
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(number_to_js_string(&Number::from(2)), "2");
        assert_eq!(number_to_js_string(&Number::from_f64(2.0).unwrap()), "2");
        assert_eq!(number_to_js_string(&Number::from_f64(-0.0).unwrap()), "0");
        assert_eq!(number_to_js_string(&Number::from_f64(1.5).unwrap()), "1.5");
    }

    #[test]
    fn test_classify_primitives() {
        assert_eq!(
            classify_primitive(&remote(json!({"type": "undefined"}))),
            EvalValue::Undefined
        );
        assert_eq!(
            classify_primitive(&remote(json!({"type": "object", "subtype": "null", "value": null}))),
            EvalValue::Null
        );
        assert_eq!(
            classify_primitive(&remote(json!({"type": "number", "value": 2, "description": "2"}))),
            EvalValue::Primitive("2".into())
        );
        assert_eq!(
            classify_primitive(&remote(json!({"type": "string", "value": "abc"}))),
            EvalValue::Primitive("abc".into())
        );
        assert_eq!(
            classify_primitive(&remote(json!({"type": "boolean", "value": false}))),
            EvalValue::Primitive("false".into())
        );
    }

    #[test]
    fn test_classify_number_uses_page_text() {
        assert_eq!(
            classify_primitive(&remote(json!({
                "type": "number",
                "value": 18446744073709552000.0,
                "description": "18446744073709552000"
            }))),
            EvalValue::Primitive("18446744073709552000".into())
        );
        assert_eq!(
            classify_primitive(&remote(
                json!({"type": "number", "value": 1e-7, "description": "1e-7"})
            )),
            EvalValue::Primitive("1e-7".into())
        );
        assert_eq!(
            classify_primitive(&remote(json!({"type": "number", "value": 3}))),
            EvalValue::Primitive("3".into())
        );
    }

    #[test]
    fn test_classify_special_numbers() {
        assert_eq!(
            classify_primitive(&remote(
                json!({"type": "number", "unserializableValue": "NaN", "description": "NaN"})
            )),
            EvalValue::Primitive("NaN".into())
        );
        assert_eq!(
            classify_primitive(&remote(
                json!({"type": "number", "unserializableValue": "-0", "description": "-0"})
            )),
            EvalValue::Primitive("0".into())
        );
        assert_eq!(
            classify_primitive(&remote(
                json!({"type": "bigint", "unserializableValue": "12n", "description": "12n"})
            )),
            EvalValue::Primitive("12".into())
        );
    }

    #[test]
    fn test_classify_function_and_symbol() {
        assert_eq!(
            classify_primitive(&remote(
                json!({"type": "function", "className": "Function", "description": "() => 1", "objectId": "1"})
            )),
            EvalValue::Undefined
        );
        assert_eq!(
            classify_primitive(&remote(
                json!({"type": "symbol", "description": "Symbol(x)", "objectId": "2"})
            )),
            EvalValue::Primitive("Symbol(x)".into())
        );
    }

    #[test]
    fn test_exception_message_from_error() {
        let d = details(json!({
            "exceptionId": 1,
            "text": "Uncaught",
            "lineNumber": 0,
            "columnNumber": 6,
            "exception": {
                "type": "object",
                "subtype": "error",
                "className": "Error",
                "description": "Error: boom\n    at <anonymous>:1:7",
                "objectId": "3"
            }
        }));
        assert_eq!(exception_message(&d), "boom");
    }

    #[test]
    fn test_exception_message_from_type_error() {
        let d = details(json!({
            "exceptionId": 1,
            "text": "Uncaught",
            "lineNumber": 0,
            "columnNumber": 0,
            "exception": {
                "type": "object",
                "subtype": "error",
                "className": "TypeError",
                "description": "TypeError: x is not a function\n    at <anonymous>:1:1"
            }
        }));
        assert_eq!(exception_message(&d), "x is not a function");
    }

    #[test]
    fn test_exception_message_from_thrown_primitive() {
        let d = details(json!({
            "exceptionId": 1,
            "text": "Uncaught",
            "lineNumber": 0,
            "columnNumber": 0,
            "exception": {"type": "string", "value": "plain"}
        }));
        assert_eq!(exception_message(&d), "plain");

        let d = details(json!({
            "exceptionId": 2,
            "text": "Uncaught",
            "lineNumber": 0,
            "columnNumber": 0,
            "exception": {"type": "number", "value": 42, "description": "42"}
        }));
        assert_eq!(exception_message(&d), "42");
    }

    #[test]
    fn test_exception_message_without_exception_object() {
        let d = details(json!({
            "exceptionId": 1,
            "text": "SyntaxError: Unexpected token ')'",
            "lineNumber": 0,
            "columnNumber": 0
        }));
        assert_eq!(exception_message(&d), "SyntaxError: Unexpected token ')'");
    }

    #[test]
    fn test_error_message_empty() {
        assert_eq!(error_message("Error\n    at foo", Some("Error")), "");
    }

    #[test]
    fn test_error_message_keeps_inner_colons() {
        assert_eq!(
            error_message("Error: a: b\n    at foo", Some("Error")),
            "a: b"
        );
    }
}
