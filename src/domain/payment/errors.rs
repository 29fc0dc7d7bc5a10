//! Payment error types.
//!
//! `PaymentError` covers building the outbound checkout request.
//! `CallbackError` covers inbound confirmations, with HTTP status mapping per
//! delivery channel and retryability semantics for the PSP's redelivery.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, OrderId, ValidationError};
use crate::domain::order::OrderStatus;

use super::confirmation::ConfirmationOrigin;
use super::origin_filter::UntrustedOrigin;

/// Errors building a signed checkout request.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    /// The order already has a final payment outcome.
    #[error("Order {order_id} is {status} and cannot be paid")]
    OrderNotPayable {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error("Order currency {actual} does not match merchant currency {expected}")]
    CurrencyMismatch { expected: String, actual: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(String),
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::OrderNotPayable { .. } => StatusCode::CONFLICT,
            PaymentError::CurrencyMismatch { .. } | PaymentError::InvalidAmount(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PaymentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for PaymentError {
    fn from(err: DomainError) -> Self {
        PaymentError::Database(err.to_string())
    }
}

/// Errors processing an inbound confirmation.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// A required field is missing or mistyped.
    #[error("Malformed confirmation: {0}")]
    Malformed(String),

    /// Well-formed, but the signature or session token does not verify.
    #[error("Signature mismatch")]
    SignatureMismatch,

    #[error(transparent)]
    UntrustedOrigin(#[from] UntrustedOrigin),

    /// Verified confirmation for an order we do not know (yet).
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error("Database error: {0}")]
    Database(String),
}

impl CallbackError {
    /// Returns true if the PSP should deliver this confirmation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CallbackError::OrderNotFound(_) | CallbackError::Database(_)
        )
    }

    /// Maps the error to the status returned on the given channel.
    ///
    /// Browser redirects only ever see a generic 500. Notifications get a
    /// 4xx where redelivery cannot help.
    pub fn status_code(&self, origin: ConfirmationOrigin) -> StatusCode {
        match (self, origin) {
            (CallbackError::Malformed(_), ConfirmationOrigin::Acquirer) => StatusCode::BAD_REQUEST,
            (CallbackError::UntrustedOrigin(_), ConfirmationOrigin::Acquirer) => {
                StatusCode::FORBIDDEN
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for CallbackError {
    fn from(err: DomainError) -> Self {
        CallbackError::Database(err.to_string())
    }
}
