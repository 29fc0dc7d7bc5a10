//! HTTP handlers for the PSP endpoints.
//!
//! Browser redirects end in a 302 to the shop, server notifications are
//! answered with a plain `OK`. Error bodies stay generic on both channels.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Form, Json, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::{
    BuildCheckoutHandler, BuildCheckoutQuery, ConfirmPaymentHandler, ProcessConfirmationCommand,
    ProcessConfirmationHandler, ProcessConfirmationResult,
};
use crate::config::{AppConfig, ValidationError};
use crate::domain::foundation::OrderId;
use crate::domain::order::OrderStatus;
use crate::domain::payment::{CallbackError, ConfirmationOrigin, PaymentError};
use crate::ports::{ConfirmationRepository, OrderRepository};

use super::dto::{CheckoutResponse, ErrorResponse};

const FORWARDED_FOR: &str = "x-forwarded-for";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the payment routes.
#[derive(Clone)]
pub struct PaymentAppState {
    pub process_confirmation: Arc<ProcessConfirmationHandler>,
    pub build_checkout: Arc<BuildCheckoutHandler>,
    /// Scheme and host the PSP redirects back to.
    pub site_base_url: String,
    pub finished_url: String,
    pub cancel_url: String,
}

impl PaymentAppState {
    /// Wires the handlers from configuration and the chosen repositories.
    pub fn from_config(
        config: &AppConfig,
        orders: Arc<dyn OrderRepository>,
        confirmations: Arc<dyn ConfirmationRepository>,
    ) -> Result<Self, ValidationError> {
        let payment = &config.payment;
        let validator = Arc::new(payment.confirmation_validator()?);
        let process_confirmation = ProcessConfirmationHandler::new(
            validator,
            confirmations,
            ConfirmPaymentHandler::new(orders.clone()),
        );
        let build_checkout = BuildCheckoutHandler::new(
            orders,
            Arc::new(payment.request_builder()),
            payment.order_standard_url.clone(),
        );

        Ok(Self {
            process_confirmation: Arc::new(process_confirmation),
            build_checkout: Arc::new(build_checkout),
            site_base_url: payment.site_base_url.clone(),
            finished_url: config.shop.finished_url.clone(),
            cancel_url: config.shop.cancel_url.clone(),
        })
    }

    fn landing_url(&self, result: &ProcessConfirmationResult) -> &str {
        if result.payment_succeeded && result.order_status != OrderStatus::Cancelled {
            &self.finished_url
        } else {
            &self.cancel_url
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Callbacks
// ════════════════════════════════════════════════════════════════════════════════

/// GET /payment/viveum/{accept,decline,exception,cancel} - Browser redirect
pub async fn confirm_redirect(
    State(state): State<PaymentAppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Query(parameters): Query<Vec<(String, String)>>,
) -> Result<Response, CallbackApiError> {
    let origin = ConfirmationOrigin::Direct;
    let cmd = ProcessConfirmationCommand {
        origin,
        parameters,
        remote_ip: Some(remote.ip()),
        forwarded_for: None,
    };

    let result = state
        .process_confirmation
        .handle(cmd)
        .await
        .map_err(|error| CallbackApiError { error, origin })?;

    let location = state.landing_url(&result).to_string();
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// POST /payment/viveum/notify - Server-to-server notification
pub async fn confirm_notification(
    State(state): State<PaymentAppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(parameters): Form<Vec<(String, String)>>,
) -> Result<&'static str, CallbackApiError> {
    let origin = ConfirmationOrigin::Acquirer;
    let forwarded_for = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let cmd = ProcessConfirmationCommand {
        origin,
        parameters,
        remote_ip: Some(remote.ip()),
        forwarded_for,
    };

    state
        .process_confirmation
        .handle(cmd)
        .await
        .map_err(|error| CallbackApiError { error, origin })?;

    Ok("OK")
}

// ════════════════════════════════════════════════════════════════════════════════
// Checkout
// ════════════════════════════════════════════════════════════════════════════════

/// GET /payment/viveum/checkout/:order_id - Signed checkout form
pub async fn get_checkout(
    State(state): State<PaymentAppState>,
    Path(order_id): Path<String>,
) -> Result<Json<CheckoutResponse>, CheckoutApiError> {
    let order_id: OrderId = order_id
        .parse()
        .map_err(|_| CheckoutApiError::InvalidOrderId)?;

    let query = BuildCheckoutQuery {
        order_id,
        site_base_url: state.site_base_url.clone(),
    };
    let form = state.build_checkout.handle(query).await?;

    Ok(Json(CheckoutResponse::new(order_id.value(), form)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// Callback failure together with the channel it arrived on.
#[derive(Debug)]
pub struct CallbackApiError {
    error: CallbackError,
    origin: ConfirmationOrigin,
}

impl IntoResponse for CallbackApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code(self.origin);

        // Rejections are logged by the handler; infrastructure failures here.
        if matches!(
            self.error,
            CallbackError::OrderNotFound(_) | CallbackError::Database(_)
        ) {
            tracing::error!(
                origin = %self.origin,
                error = %self.error,
                retryable = self.error.is_retryable(),
                "Payment confirmation failed"
            );
        }

        let body = match status {
            StatusCode::BAD_REQUEST => {
                ErrorResponse::new("MALFORMED_CONFIRMATION", "Malformed payment confirmation")
            }
            StatusCode::FORBIDDEN => ErrorResponse::new("FORBIDDEN", "Forbidden"),
            _ => ErrorResponse::new("INTERNAL_ERROR", "Internal server error"),
        };
        (status, Json(body)).into_response()
    }
}

/// Checkout failures.
#[derive(Debug)]
pub enum CheckoutApiError {
    InvalidOrderId,
    Payment(PaymentError),
}

impl From<PaymentError> for CheckoutApiError {
    fn from(err: PaymentError) -> Self {
        Self::Payment(err)
    }
}

impl IntoResponse for CheckoutApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            CheckoutApiError::InvalidOrderId => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("INVALID_ORDER_ID", "Order id must be a positive integer"),
            ),
            CheckoutApiError::Payment(err) => {
                let error_code = match err {
                    PaymentError::OrderNotFound(_) => "ORDER_NOT_FOUND",
                    PaymentError::OrderNotPayable { .. } => "ORDER_NOT_PAYABLE",
                    PaymentError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
                    PaymentError::InvalidAmount(_) => "INVALID_AMOUNT",
                    PaymentError::Database(_) => "INTERNAL_ERROR",
                };
                let message = if let PaymentError::Database(_) = err {
                    tracing::error!(error = %err, "Checkout form could not be built");
                    "Internal server error".to_string()
                } else {
                    err.to_string()
                };
                (err.status_code(), ErrorResponse::new(error_code, message))
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::UntrustedOrigin;

    fn callback_status(error: CallbackError, origin: ConfirmationOrigin) -> StatusCode {
        CallbackApiError { error, origin }.into_response().status()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Callback errors
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn malformed_notification_is_bad_request() {
        let status = callback_status(
            CallbackError::Malformed("missing field `status`".to_string()),
            ConfirmationOrigin::Acquirer,
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn malformed_redirect_is_generic_server_error() {
        let status = callback_status(
            CallbackError::Malformed("missing field `status`".to_string()),
            ConfirmationOrigin::Direct,
        );
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn untrusted_notification_is_forbidden() {
        let untrusted = UntrustedOrigin {
            remote: "198.51.100.7".to_string(),
            forwarded_for: "-".to_string(),
        };
        let status = callback_status(
            CallbackError::UntrustedOrigin(untrusted),
            ConfirmationOrigin::Acquirer,
        );
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn signature_mismatch_is_server_error_on_both_channels() {
        for origin in [ConfirmationOrigin::Acquirer, ConfirmationOrigin::Direct] {
            assert_eq!(
                callback_status(CallbackError::SignatureMismatch, origin),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Checkout errors
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn checkout_not_found_maps_to_404() {
        let err = CheckoutApiError::from(PaymentError::OrderNotFound(OrderId::new(3).unwrap()));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn checkout_not_payable_maps_to_409() {
        let err = CheckoutApiError::from(PaymentError::OrderNotPayable {
            order_id: OrderId::new(3).unwrap(),
            status: OrderStatus::Completed,
        });
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_order_id_maps_to_400() {
        assert_eq!(
            CheckoutApiError::InvalidOrderId.into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
