//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `http` - axum routes for the PSP callbacks and checkout form
//! - `memory` - In-memory repositories (development, tests)
//! - `postgres` - sqlx repositories

pub mod http;
pub mod memory;
pub mod postgres;

pub use memory::{InMemoryConfirmationRepository, InMemoryOrderRepository};
pub use postgres::{PostgresConfirmationRepository, PostgresOrderRepository};
