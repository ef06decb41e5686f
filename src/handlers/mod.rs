pub mod admin;
pub mod health;
pub mod investments;

use axum::extract::{FromRequest, FromRequestParts};
use serde_json::Value;

use crate::api_error::ApiError;

/// `Json` whose rejections answer with the JSON error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Path` whose rejections answer with the JSON error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Amounts arrive as JSON numbers or strings. Anything else becomes empty
/// text, which amount parsing rejects.
pub(crate) fn amount_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_amount_text_accepts_numbers_and_strings() {
        assert_eq!(amount_text(&json!(200)), "200");
        assert_eq!(amount_text(&json!(200.5)), "200.5");
        assert_eq!(amount_text(&json!("150")), "150");
        assert_eq!(amount_text(&json!(null)), "");
        assert_eq!(amount_text(&json!([1])), "");
    }
}
