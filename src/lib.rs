//! viveum-offsite - Offsite payment provider integration
//!
//! Sends the customer to the PSP's hosted payment page with a signed form,
//! and turns the PSP's redirects and server notifications into verified
//! order state changes.
//!
//! - `domain` - Signature engine, request builder, confirmation validation
//! - `ports` - Repository interfaces
//! - `application` - Command and query handlers
//! - `adapters` - axum, sqlx and in-memory implementations

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
