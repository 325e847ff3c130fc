use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Conflict,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 422 => Self::Validation,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            _ => Self::Internal,
        }
    }
}

/// Error body returned by the backend. Some endpoints answer with
/// `{"detail": ...}` or `{"error": ...}` instead of `{"message": "..."}`,
/// and validation failures carry a list of `{"loc", "msg"}` entries.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    #[serde(default = "default_code")]
    pub code: ErrorCode,
    #[serde(alias = "detail", alias = "error")]
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Parses a response body, falling back to the status-derived code and
    /// the raw text when the body is not JSON.
    pub fn from_response(status: u16, body: &str) -> Self {
        let status_code = ErrorCode::from_status(status);
        let trimmed = body.trim();
        let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
            let message = if trimmed.is_empty() {
                format!("request failed with status {status}")
            } else {
                trimmed.to_string()
            };
            return Self::new(status_code, message);
        };

        let code = value
            .get("code")
            .and_then(|code| ErrorCode::deserialize(code).ok())
            .filter(|code| *code != ErrorCode::Internal)
            .unwrap_or(status_code);
        let message = ["message", "detail", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(flatten_detail))
            .unwrap_or_else(|| format!("request failed with status {status}"));
        Self::new(code, message)
    }
}

/// Renders a detail value as one line of text. Lists are joined with `; `
/// and validation entries become `field: msg`.
fn flatten_detail(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(flatten_detail).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Object(fields) => {
            let message = ["msg", "message", "detail"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(flatten_detail))?;
            let field = fields
                .get("loc")
                .and_then(Value::as_array)
                .and_then(|loc| loc.last())
                .and_then(|last| match last {
                    Value::String(name) => Some(name.clone()),
                    Value::Number(index) => Some(index.to_string()),
                    _ => None,
                });
            Some(match field {
                Some(field) => format!("{field}: {message}"),
                None => message,
            })
        }
        _ => None,
    }
}

fn default_code() -> ErrorCode {
    ErrorCode::Internal
}
