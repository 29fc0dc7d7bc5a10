//! Provider-neutral view of confirmation parameters.
//!
//! The PSP family uses different names for the same value depending on the
//! product line (`orderID` vs `shopper_id`, `PAYID` vs `ret_trx_number`). The
//! alias table below maps every known provider name onto one canonical field,
//! applying a value transform where units differ.

use std::collections::{BTreeMap, HashMap};

use crate::domain::foundation::ValidationError;
use crate::domain::order::money::from_minor_units;

/// Canonical confirmation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    Order,
    Status,
    Amount,
    Currency,
    TransactionId,
    Acceptance,
    CardNumber,
    CardholderName,
    Brand,
    PaymentMethod,
    NcError,
    ClientIp,
    TransactionDate,
    TransactionTime,
    Signature,
    SessionToken,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Order => "order",
            CanonicalField::Status => "status",
            CanonicalField::Amount => "amount",
            CanonicalField::Currency => "currency",
            CanonicalField::TransactionId => "transaction_id",
            CanonicalField::Acceptance => "acceptance",
            CanonicalField::CardNumber => "card_number",
            CanonicalField::CardholderName => "cardholder_name",
            CanonicalField::Brand => "brand",
            CanonicalField::PaymentMethod => "payment_method",
            CanonicalField::NcError => "nc_error",
            CanonicalField::ClientIp => "client_ip",
            CanonicalField::TransactionDate => "transaction_date",
            CanonicalField::TransactionTime => "transaction_time",
            CanonicalField::Signature => "signature",
            CanonicalField::SessionToken => "session_token",
        }
    }
}

/// Value conversion applied while mapping a provider field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTransform {
    /// Value is taken as sent, trimmed.
    Identity,
    /// Integer minor units, converted to a two-place decimal string.
    MinorUnits,
}

/// One provider name and the canonical field it feeds.
#[derive(Debug, Clone, Copy)]
pub struct FieldAlias {
    /// Lowercase provider parameter name.
    pub provider: &'static str,
    pub canonical: CanonicalField,
    pub transform: FieldTransform,
}

const fn alias(provider: &'static str, canonical: CanonicalField) -> FieldAlias {
    FieldAlias {
        provider,
        canonical,
        transform: FieldTransform::Identity,
    }
}

/// Every provider name this backend understands.
pub const FIELD_ALIASES: &[FieldAlias] = &[
    alias("orderid", CanonicalField::Order),
    alias("shopper_id", CanonicalField::Order),
    alias("status", CanonicalField::Status),
    alias("ret_status", CanonicalField::Status),
    alias("amount", CanonicalField::Amount),
    FieldAlias {
        provider: "trx_amount",
        canonical: CanonicalField::Amount,
        transform: FieldTransform::MinorUnits,
    },
    alias("currency", CanonicalField::Currency),
    alias("trx_currency", CanonicalField::Currency),
    alias("payid", CanonicalField::TransactionId),
    alias("ret_trx_number", CanonicalField::TransactionId),
    alias("acceptance", CanonicalField::Acceptance),
    alias("ret_authcode", CanonicalField::Acceptance),
    alias("cardno", CanonicalField::CardNumber),
    alias("cn", CanonicalField::CardholderName),
    alias("addr_name", CanonicalField::CardholderName),
    alias("brand", CanonicalField::Brand),
    alias("pm", CanonicalField::PaymentMethod),
    alias("ncerror", CanonicalField::NcError),
    alias("ret_errorcode", CanonicalField::NcError),
    alias("ip", CanonicalField::ClientIp),
    alias("trxdate", CanonicalField::TransactionDate),
    alias("ret_transdate", CanonicalField::TransactionDate),
    alias("ret_transtime", CanonicalField::TransactionTime),
    alias("shasign", CanonicalField::Signature),
    alias("sessionid", CanonicalField::SessionToken),
    alias("ipayment_session_id", CanonicalField::SessionToken),
];

fn lookup(provider_name: &str) -> Option<&'static FieldAlias> {
    FIELD_ALIASES.iter().find(|a| a.provider == provider_name)
}

/// Confirmation parameters after alias resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedParams {
    fields: HashMap<CanonicalField, String>,
    sources: HashMap<CanonicalField, Vec<&'static str>>,
    unmapped: BTreeMap<String, String>,
}

impl NormalizedParams {
    /// Resolves raw `(name, value)` pairs.
    ///
    /// Names are matched case-insensitively. Empty values count as absent.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when two names resolve to the same field with
    /// different values, or when a transform cannot parse its input.
    pub fn from_raw(raw: &[(String, String)]) -> Result<Self, ValidationError> {
        let mut normalized = NormalizedParams::default();

        for (name, value) in raw {
            let name = name.trim().to_lowercase();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            let Some(alias) = lookup(&name) else {
                match normalized.unmapped.get(&name) {
                    Some(existing) if existing != value => return Err(conflict(&name)),
                    Some(_) => {}
                    None => {
                        normalized.unmapped.insert(name, value.to_string());
                    }
                }
                continue;
            };

            let value = match alias.transform {
                FieldTransform::Identity => value.to_string(),
                FieldTransform::MinorUnits => {
                    let minor: i64 = value.parse().map_err(|_| {
                        ValidationError::invalid_format(&name, "expected integer minor units")
                    })?;
                    from_minor_units(minor).to_string()
                }
            };

            match normalized.fields.get(&alias.canonical) {
                Some(existing) if *existing != value => {
                    return Err(conflict(alias.canonical.as_str()))
                }
                Some(_) => {}
                None => {
                    normalized.fields.insert(alias.canonical, value);
                }
            }
            let sources = normalized.sources.entry(alias.canonical).or_default();
            if !sources.contains(&alias.provider) {
                sources.push(alias.provider);
            }
        }

        Ok(normalized)
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Lowercase provider names that carried `field`, in arrival order.
    ///
    /// All of them carried the same value; conflicting names are rejected.
    pub fn provided_by(&self, field: CanonicalField) -> &[&'static str] {
        self.sources.get(&field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Lowercased parameters no alias recognised.
    pub fn unmapped(&self) -> &BTreeMap<String, String> {
        &self.unmapped
    }
}

fn conflict(field: &str) -> ValidationError {
    ValidationError::invalid_format(field, "conflicting values for the same field")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // ══════════════════════════════════════════════════════════════
    // Alias Resolution
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn ogone_names_resolve_case_insensitively() {
        let params = NormalizedParams::from_raw(&raw(&[
            ("orderID", "12"),
            ("STATUS", "5"),
            ("amount", "1.23"),
            ("PAYID", "3014"),
            ("SHASIGN", "ABC"),
        ]))
        .unwrap();

        assert_eq!(params.get(CanonicalField::Order), Some("12"));
        assert_eq!(params.get(CanonicalField::Status), Some("5"));
        assert_eq!(params.get(CanonicalField::Amount), Some("1.23"));
        assert_eq!(params.get(CanonicalField::TransactionId), Some("3014"));
        assert_eq!(params.get(CanonicalField::Signature), Some("ABC"));
    }

    #[test]
    fn ipayment_names_resolve_and_minor_units_convert() {
        let params = NormalizedParams::from_raw(&raw(&[
            ("shopper_id", "12"),
            ("ret_status", "SUCCESS"),
            ("trx_amount", "123"),
            ("trx_currency", "EUR"),
            ("ret_trx_number", "1-2345"),
        ]))
        .unwrap();

        assert_eq!(params.get(CanonicalField::Order), Some("12"));
        assert_eq!(params.get(CanonicalField::Status), Some("SUCCESS"));
        assert_eq!(params.get(CanonicalField::Amount), Some("1.23"));
        assert_eq!(params.get(CanonicalField::Currency), Some("EUR"));
        assert_eq!(params.get(CanonicalField::TransactionId), Some("1-2345"));
    }

    #[test]
    fn provider_names_are_recorded_per_field() {
        let params = NormalizedParams::from_raw(&raw(&[
            ("orderID", "12"),
            ("shopper_id", "12"),
            ("trx_amount", "123"),
            ("PAYID", ""),
        ]))
        .unwrap();

        assert_eq!(params.provided_by(CanonicalField::Order), ["orderid", "shopper_id"]);
        assert_eq!(params.provided_by(CanonicalField::Amount), ["trx_amount"]);
        assert!(params.provided_by(CanonicalField::TransactionId).is_empty());
    }

    #[test]
    fn unknown_names_are_kept_lowercased() {
        let params =
            NormalizedParams::from_raw(&raw(&[("COMPLUS", "note"), ("orderID", "1")])).unwrap();
        assert_eq!(params.unmapped().get("complus").map(String::as_str), Some("note"));
    }

    #[test]
    fn empty_values_count_as_absent() {
        let params = NormalizedParams::from_raw(&raw(&[("PAYID", ""), ("STATUS", " ")])).unwrap();
        assert_eq!(params.get(CanonicalField::TransactionId), None);
        assert_eq!(params.get(CanonicalField::Status), None);
    }

    // ══════════════════════════════════════════════════════════════
    // Conflicts
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn conflicting_aliases_are_rejected() {
        let result = NormalizedParams::from_raw(&raw(&[("orderID", "1"), ("shopper_id", "2")]));
        assert!(result.is_err());
    }

    #[test]
    fn repeated_name_with_different_value_is_rejected() {
        let result = NormalizedParams::from_raw(&raw(&[("STATUS", "2"), ("status", "9")]));
        assert!(result.is_err());
    }

    #[test]
    fn repeated_name_with_same_value_is_accepted() {
        let params = NormalizedParams::from_raw(&raw(&[("STATUS", "9"), ("status", "9")])).unwrap();
        assert_eq!(params.get(CanonicalField::Status), Some("9"));
    }

    #[test]
    fn non_integer_minor_units_are_rejected() {
        let result = NormalizedParams::from_raw(&raw(&[("trx_amount", "1.23")]));
        assert!(result.is_err());
    }
}
