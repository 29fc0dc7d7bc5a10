//! PostgreSQL implementation of OrderRepository.
//!
//! Status changes are conditional updates keyed on the current status, so
//! concurrent confirmations for one order cannot both win. Payments are
//! unique per (order, transaction id).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, OrderId, Timestamp};
use crate::domain::order::{BillingAddress, Order, OrderStatus};
use crate::ports::{OrderPayment, OrderRepository, SaveResult, StatusUpdate};

/// PostgreSQL implementation of the OrderRepository port.
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an order.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    total: Decimal,
    currency: String,
    status: String,
    billing_name: Option<String>,
    billing_address: Option<String>,
    billing_address2: Option<String>,
    billing_zip_code: Option<String>,
    billing_city: Option<String>,
    billing_country: Option<String>,
    customer_email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn billing(&self) -> Option<BillingAddress> {
        let parts = [
            &self.billing_name,
            &self.billing_address,
            &self.billing_address2,
            &self.billing_zip_code,
            &self.billing_city,
            &self.billing_country,
        ];
        if parts.iter().all(|p| p.is_none()) {
            return None;
        }
        Some(BillingAddress {
            name: self.billing_name.clone().unwrap_or_default(),
            address: self.billing_address.clone().unwrap_or_default(),
            address2: self.billing_address2.clone().unwrap_or_default(),
            zip_code: self.billing_zip_code.clone().unwrap_or_default(),
            city: self.billing_city.clone().unwrap_or_default(),
            country: self.billing_country.clone().unwrap_or_default(),
        })
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let billing_address = row.billing();
        let id = OrderId::new(row.id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid order id: {}", e))
        })?;
        Ok(Order {
            id,
            total: row.total,
            currency: row.currency.trim().to_string(),
            status: parse_status(&row.status)?,
            billing_address,
            customer_email: row.customer_email,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn parse_status(s: &str) -> Result<OrderStatus, DomainError> {
    s.parse().map_err(|_| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid status value: {}", s),
        )
    })
}

fn not_found(id: OrderId) -> DomainError {
    DomainError::new(ErrorCode::OrderNotFound, format!("Order {} not found", id))
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, DomainError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, total, currency, status,
                   billing_name, billing_address, billing_address2,
                   billing_zip_code, billing_city, billing_country,
                   customer_email, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load order: {}", e)))?;

        row.map(Order::try_from).transpose()
    }

    async fn save(&self, order: &Order) -> Result<(), DomainError> {
        let billing = order.billing_address.as_ref();
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, total, currency, status,
                billing_name, billing_address, billing_address2,
                billing_zip_code, billing_city, billing_country,
                customer_email, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                total = EXCLUDED.total,
                currency = EXCLUDED.currency,
                status = EXCLUDED.status,
                billing_name = EXCLUDED.billing_name,
                billing_address = EXCLUDED.billing_address,
                billing_address2 = EXCLUDED.billing_address2,
                billing_zip_code = EXCLUDED.billing_zip_code,
                billing_city = EXCLUDED.billing_city,
                billing_country = EXCLUDED.billing_country,
                customer_email = EXCLUDED.customer_email,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(order.id.value())
        .bind(order.total)
        .bind(&order.currency)
        .bind(order.status.as_str())
        .bind(billing.map(|b| b.name.as_str()))
        .bind(billing.map(|b| b.address.as_str()))
        .bind(billing.map(|b| b.address2.as_str()))
        .bind(billing.map(|b| b.zip_code.as_str()))
        .bind(billing.map(|b| b.city.as_str()))
        .bind(billing.map(|b| b.country.as_str()))
        .bind(&order.customer_email)
        .bind(order.created_at.as_datetime())
        .bind(order.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to save order: {}", e)))?;

        Ok(())
    }

    async fn compare_and_set_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        target: OrderStatus,
    ) -> Result<StatusUpdate, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = $3, updated_at = now()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id.value())
        .bind(expected.as_str())
        .bind(target.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update order status: {}", e)))?;

        if result.rows_affected() == 1 {
            return Ok(StatusUpdate::Applied);
        }

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to load order status: {}", e)))?;

        match current {
            Some(status) => Ok(StatusUpdate::Stale(parse_status(&status)?)),
            None => Err(not_found(id)),
        }
    }

    async fn record_payment(&self, payment: OrderPayment) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO order_payments (order_id, amount, transaction_id, payment_method, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (order_id, transaction_id) DO NOTHING
            "#,
        )
        .bind(payment.order_id.value())
        .bind(payment.amount)
        .bind(&payment.transaction_id)
        .bind(&payment.payment_method)
        .bind(payment.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_foreign_key_violation() {
                    return not_found(payment.order_id);
                }
            }
            DomainError::database(format!("Failed to record payment: {}", e))
        })?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn amount_paid(&self, id: OrderId) -> Result<Decimal, DomainError> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM order_payments WHERE order_id = $1",
        )
        .bind(id.value())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to sum payments: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn row() -> OrderRow {
        OrderRow {
            id: 42,
            total: Decimal::from_str("1.23").unwrap(),
            currency: "EUR".to_string(),
            status: "pending".to_string(),
            billing_name: None,
            billing_address: None,
            billing_address2: None,
            billing_zip_code: None,
            billing_city: None,
            billing_country: None,
            customer_email: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_without_billing_columns_has_no_address() {
        let order = Order::try_from(row()).unwrap();
        assert_eq!(order.id.value(), 42);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.billing_address.is_none());
    }

    #[test]
    fn partial_billing_columns_fill_with_empty_strings() {
        let order = Order::try_from(OrderRow {
            billing_name: Some("Ada Lovelace".to_string()),
            billing_city: Some("London".to_string()),
            ..row()
        })
        .unwrap();

        let billing = order.billing_address.unwrap();
        assert_eq!(billing.name, "Ada Lovelace");
        assert_eq!(billing.city, "London");
        assert_eq!(billing.zip_code, "");
    }

    #[test]
    fn unknown_status_is_a_database_error() {
        let err = Order::try_from(OrderRow {
            status: "shipped".to_string(),
            ..row()
        })
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
