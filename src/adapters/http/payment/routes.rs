//! Axum router configuration for the PSP endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use crate::domain::payment::CALLBACK_PATH;

use super::handlers::{confirm_notification, confirm_redirect, get_checkout, PaymentAppState};

/// Create the payment routes.
///
/// # Routes
///
/// ## Browser redirects (signature verified)
/// - `GET /accept`, `/decline`, `/exception`, `/cancel`
///
/// ## Server notification (origin and signature verified)
/// - `POST /notify`
///
/// ## Checkout
/// - `GET /checkout/:order_id` - Signed form fields and PSP action URL
pub fn payment_routes() -> Router<PaymentAppState> {
    Router::new()
        .route("/accept", get(confirm_redirect))
        .route("/decline", get(confirm_redirect))
        .route("/exception", get(confirm_redirect))
        .route("/cancel", get(confirm_redirect))
        .route("/notify", post(confirm_notification))
        .route("/checkout/:order_id", get(get_checkout))
}

/// Payment routes mounted under `/payment/viveum`.
///
/// Handlers read the peer address, so the app must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn payment_router() -> Router<PaymentAppState> {
    Router::new().nest(CALLBACK_PATH, payment_routes())
}
