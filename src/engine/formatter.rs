//! Response Formatter
//!
//! Terminal behavior of a `response` node: normalizes the live payload into the
//! envelope the chat endpoint returns. Text passes through verbatim; structured
//! payloads are pretty-printed for display and also returned as `data` for
//! programmatic use.

use serde::Serialize;
use serde_json::Value;

use crate::models::{CommunicationMethod, Payload};

/// The envelope delivered to the chat endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedResponse {
    pub method: CommunicationMethod,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFormatter;

impl ResponseFormatter {
    pub fn format(&self, payload: &Payload, method: CommunicationMethod) -> FormattedResponse {
        match payload {
            Payload::Text(text) => FormattedResponse {
                method,
                response: text.clone(),
                data: None,
            },
            Payload::Structured(value) => FormattedResponse {
                method,
                response: serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
                data: Some(value.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_is_verbatim() {
        let formatted = ResponseFormatter.format(
            &Payload::text("  Your order is out for delivery "),
            CommunicationMethod::ModuleToFrontend,
        );
        assert_eq!(formatted.response, "  Your order is out for delivery ");
        assert!(formatted.data.is_none());
        assert_eq!(formatted.method, CommunicationMethod::ModuleToFrontend);
    }

    #[test]
    fn test_structured_is_pretty_printed_and_kept() {
        let value = json!({"orderId": "1234", "status": "cancelled"});
        let formatted = ResponseFormatter.format(&Payload::Structured(value.clone()), CommunicationMethod::ModuleToFrontend);
        assert_eq!(formatted.response, serde_json::to_string_pretty(&value).unwrap());
        assert!(formatted.response.contains('\n'));
        assert_eq!(formatted.data, Some(value));
    }
}
