//! PostgreSQL implementation of ConfirmationRepository.
//!
//! Confirmations are unique on their idempotency key; a redelivery hits
//! `ON CONFLICT DO NOTHING` and is reported as `AlreadyExists`. Rejected
//! callbacks go to a separate append-only audit table.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{ConfirmationId, DomainError, ErrorCode, OrderId, Timestamp};
use crate::domain::payment::{Confirmation, PspStatus};
use crate::ports::{CallbackAudit, ConfirmationRepository, SaveResult};

/// PostgreSQL implementation of the ConfirmationRepository port.
pub struct PostgresConfirmationRepository {
    pool: PgPool,
}

impl PostgresConfirmationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ConfirmationRow {
    id: Uuid,
    order_id: i64,
    origin: String,
    status: String,
    amount: Decimal,
    currency: Option<String>,
    transaction_id: Option<String>,
    signature: Option<String>,
    transacted_at: Option<DateTime<Utc>>,
    parameters: Json<BTreeMap<String, String>>,
    received_at: DateTime<Utc>,
}

impl TryFrom<ConfirmationRow> for Confirmation {
    type Error = DomainError;

    fn try_from(row: ConfirmationRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str, e: &dyn std::fmt::Display| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid {}: {}", what, e))
        };

        Ok(Confirmation {
            id: ConfirmationId::from_uuid(row.id),
            order_id: OrderId::new(row.order_id).map_err(|e| corrupt("order id", &e))?,
            origin: row.origin.parse().map_err(|e| corrupt("origin", &e))?,
            status: PspStatus::parse(&row.status).map_err(|e| corrupt("status", &e))?,
            amount: row.amount,
            currency: row.currency.map(|c| c.trim().to_string()),
            transaction_id: row.transaction_id,
            signature: row.signature,
            transacted_at: row.transacted_at.map(Timestamp::from_datetime),
            parameters: row.parameters.0,
            received_at: Timestamp::from_datetime(row.received_at),
        })
    }
}

#[async_trait]
impl ConfirmationRepository for PostgresConfirmationRepository {
    async fn save(&self, confirmation: &Confirmation) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payment_confirmations (
                id, idempotency_key, order_id, origin, status, amount, currency,
                transaction_id, signature, transacted_at, parameters, received_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(confirmation.id.as_uuid())
        .bind(confirmation.idempotency_key())
        .bind(confirmation.order_id.value())
        .bind(confirmation.origin.as_str())
        .bind(confirmation.status.as_str())
        .bind(confirmation.amount)
        .bind(&confirmation.currency)
        .bind(&confirmation.transaction_id)
        .bind(&confirmation.signature)
        .bind(confirmation.transacted_at.map(|t| *t.as_datetime()))
        .bind(Json(&confirmation.parameters))
        .bind(confirmation.received_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_foreign_key_violation() {
                    return DomainError::new(
                        ErrorCode::OrderNotFound,
                        format!("Order {} not found", confirmation.order_id),
                    );
                }
            }
            DomainError::database(format!("Failed to save confirmation: {}", e))
        })?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<Confirmation>, DomainError> {
        let rows: Vec<ConfirmationRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, origin, status, amount, currency, transaction_id,
                   signature, transacted_at, parameters, received_at
            FROM payment_confirmations
            WHERE order_id = $1
            ORDER BY received_at
            "#,
        )
        .bind(order_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load confirmations: {}", e)))?;

        rows.into_iter().map(Confirmation::try_from).collect()
    }

    async fn record_rejection(&self, audit: CallbackAudit) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payment_callback_audit (
                kind, origin, reason, remote_ip, order_reference, parameters, received_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(audit.kind.as_str())
        .bind(audit.origin.as_str())
        .bind(&audit.reason)
        .bind(&audit.remote_ip)
        .bind(&audit.order_reference)
        .bind(Json(&audit.parameters))
        .bind(audit.received_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to record rejected callback: {}", e)))?;

        Ok(())
    }
}
