//! HTTP adapter for the PSP endpoints.
//!
//! Exposes the browser redirect and server notification callbacks plus
//! the checkout form query.

mod dto;
mod handlers;
mod routes;

pub use dto::{CheckoutResponse, ErrorResponse};
pub use handlers::{
    confirm_notification, confirm_redirect, get_checkout, CallbackApiError, CheckoutApiError,
    PaymentAppState,
};
pub use routes::{payment_router, payment_routes};
