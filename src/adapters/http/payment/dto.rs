//! Request and response DTOs for payment endpoints.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::application::CheckoutForm;

/// Signed hidden fields and the PSP form target.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub order_id: i64,
    /// URL the browser posts the form to.
    pub action_url: String,
    pub fields: BTreeMap<String, String>,
}

impl CheckoutResponse {
    pub fn new(order_id: i64, form: CheckoutForm) -> Self {
        Self {
            order_id,
            action_url: form.action_url,
            fields: form.fields.into_inner(),
        }
    }
}

/// Standard error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::SignedFormFields;

    #[test]
    fn checkout_response_serializes_fields_as_object() {
        let form = CheckoutForm {
            action_url: "https://psp.example/orderstandard.asp".to_string(),
            fields: SignedFormFields::default(),
        };

        let json = serde_json::to_value(CheckoutResponse::new(7, form)).unwrap();

        assert_eq!(json["order_id"], 7);
        assert_eq!(json["action_url"], "https://psp.example/orderstandard.asp");
        assert!(json["fields"].as_object().unwrap().is_empty());
    }

    #[test]
    fn error_response_carries_code_and_message() {
        let response = ErrorResponse::new("ORDER_NOT_FOUND", "Order not found");
        assert_eq!(response.error_code, "ORDER_NOT_FOUND");
        assert_eq!(response.message, "Order not found");
    }
}
