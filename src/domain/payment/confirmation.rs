//! Confirmation form schema and the persisted confirmation record.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ConfirmationId, OrderId, Timestamp, ValidationError};

use super::field_mapping::{CanonicalField, NormalizedParams};

/// Date and time layout of the notification's `ret_transdate` / `ret_transtime`.
const NOTIFICATION_DATETIME_FORMAT: &str = "%d.%m.%y %H:%M:%S";

/// Date layout of the redirect's `TRXDATE`.
const REDIRECT_DATE_FORMAT: &str = "%m/%d/%y";

/// Channel a confirmation arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOrigin {
    /// Server-to-server notification posted by the acquirer.
    Acquirer,
    /// Customer's browser redirected back from the PSP.
    Direct,
}

impl ConfirmationOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationOrigin::Acquirer => "acquirer",
            ConfirmationOrigin::Direct => "direct",
        }
    }
}

impl fmt::Display for ConfirmationOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfirmationOrigin {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "acquirer" => Ok(ConfirmationOrigin::Acquirer),
            "direct" => Ok(ConfirmationOrigin::Direct),
            other => Err(ValidationError::invalid_format(
                "origin",
                format!("unknown confirmation origin '{}'", other),
            )),
        }
    }
}

/// Status code reported by the PSP.
///
/// Numeric codes come from the SHA-based product line, `SUCCESS` and `ERROR`
/// from the session-based one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PspStatus(String);

impl PspStatus {
    /// Parses a status code.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` unless the code is all digits or a known word.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let code = raw.trim().to_uppercase();
        let numeric = !code.is_empty() && code.chars().all(|c| c.is_ascii_digit());
        if numeric || code == "SUCCESS" || code == "ERROR" {
            Ok(Self(code))
        } else {
            Err(ValidationError::invalid_format(
                "status",
                format!("unrecognised status code '{}'", raw.trim()),
            ))
        }
    }

    /// `5x`, `9x` and `SUCCESS` mean the payment went through.
    pub fn is_success(&self) -> bool {
        self.0 == "SUCCESS" || self.0.starts_with('5') || self.0.starts_with('9')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PspStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed view of a confirmation callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationForm {
    pub order_id: OrderId,
    pub status: PspStatus,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub transaction_id: Option<String>,
    pub acceptance: Option<String>,
    pub card_number: Option<String>,
    pub cardholder_name: Option<String>,
    pub brand: Option<String>,
    pub payment_method: Option<String>,
    pub nc_error: Option<String>,
    pub client_ip: Option<String>,
    pub transacted_at: Option<Timestamp>,
    pub signature: Option<String>,
    pub session_token: Option<String>,
}

impl ConfirmationForm {
    /// Checks required fields and converts them to their types.
    ///
    /// Order id, status and amount are required. Optional fields stay as sent;
    /// an unparseable transaction date is dropped rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` naming the first missing or mistyped field.
    pub fn parse(params: &NormalizedParams) -> Result<Self, ValidationError> {
        let order_id: OrderId = required(params, CanonicalField::Order)?.parse()?;
        let status = PspStatus::parse(required(params, CanonicalField::Status)?)?;

        let raw_amount = required(params, CanonicalField::Amount)?;
        let amount = Decimal::from_str(raw_amount).map_err(|_| {
            ValidationError::invalid_format("amount", format!("'{}' is not a decimal", raw_amount))
        })?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ValidationError::negative("amount", amount));
        }

        let optional = |field| params.get(field).map(str::to_string);

        Ok(Self {
            order_id,
            status,
            amount,
            currency: optional(CanonicalField::Currency).map(|c| c.to_uppercase()),
            transaction_id: optional(CanonicalField::TransactionId),
            acceptance: optional(CanonicalField::Acceptance),
            card_number: optional(CanonicalField::CardNumber),
            cardholder_name: optional(CanonicalField::CardholderName),
            brand: optional(CanonicalField::Brand),
            payment_method: optional(CanonicalField::PaymentMethod),
            nc_error: optional(CanonicalField::NcError),
            client_ip: optional(CanonicalField::ClientIp),
            transacted_at: parse_transaction_time(params),
            signature: optional(CanonicalField::Signature),
            session_token: optional(CanonicalField::SessionToken),
        })
    }
}

fn required(params: &NormalizedParams, field: CanonicalField) -> Result<&str, ValidationError> {
    params
        .get(field)
        .ok_or_else(|| ValidationError::empty_field(field.as_str()))
}

fn parse_transaction_time(params: &NormalizedParams) -> Option<Timestamp> {
    let date = params.get(CanonicalField::TransactionDate)?;
    let naive = match params.get(CanonicalField::TransactionTime) {
        Some(time) => NaiveDateTime::parse_from_str(
            &format!("{} {}", date, time),
            NOTIFICATION_DATETIME_FORMAT,
        )
        .ok()?,
        None => NaiveDate::parse_from_str(date, REDIRECT_DATE_FORMAT)
            .ok()?
            .and_hms_opt(0, 0, 0)?,
    };
    Some(Timestamp::from_naive_utc(naive))
}

/// One verified PSP callback, correlated to its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub id: ConfirmationId,
    pub order_id: OrderId,
    pub origin: ConfirmationOrigin,
    pub status: PspStatus,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub transaction_id: Option<String>,
    pub signature: Option<String>,
    pub transacted_at: Option<Timestamp>,
    /// Every parameter the PSP sent, names lowercased.
    pub parameters: BTreeMap<String, String>,
    pub received_at: Timestamp,
}

impl Confirmation {
    /// Builds the record for a callback that passed verification.
    pub fn from_form(
        form: ConfirmationForm,
        origin: ConfirmationOrigin,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: ConfirmationId::new(),
            order_id: form.order_id,
            origin,
            status: form.status,
            amount: form.amount,
            currency: form.currency,
            transaction_id: form.transaction_id,
            signature: form.signature.or(form.session_token),
            transacted_at: form.transacted_at,
            parameters,
            received_at: Timestamp::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Key identifying redeliveries of the same callback.
    ///
    /// The PSP resends identical parameters, so order, origin, transaction id
    /// and status together identify a delivery.
    pub fn idempotency_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.order_id,
            self.origin,
            self.transaction_id.as_deref().unwrap_or("-"),
            self.status
        )
    }

    /// Identifies the payment itself, independent of the delivery channel.
    ///
    /// The PSP transaction id when sent; otherwise order and amount. Status is
    /// left out so an authorised and a captured report of one payment count
    /// once.
    pub fn payment_reference(&self) -> String {
        match &self.transaction_id {
            Some(transaction_id) => transaction_id.clone(),
            None => format!("{}:{}", self.order_id, self.amount.normalize()),
        }
    }
}
