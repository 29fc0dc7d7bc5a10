//! Outbound payment request.
//!
//! Turns an order into the hidden form fields the customer's browser posts to
//! the PSP. The builder is pure: the same order, address and base URL always
//! produce the same fields.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::order::{money, BillingAddress, Order};

use super::errors::PaymentError;
use super::session_token::{SessionTokenIssuer, SESSION_TOKEN_PARAMETER};
use super::signature::{ShaSigner, SignaturePayload, SIGNATURE_PARAMETER};

/// Path under which the callback endpoints are mounted.
pub const CALLBACK_PATH: &str = "/payment/viveum";

/// Placeholder replaced by the order id in the order description.
pub const ORDER_ID_PLACEHOLDER: &str = "{order_id}";

/// Merchant settings that end up on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantProfile {
    pub pspid: String,
    pub currency: String,
    pub language: String,
    pub title: Option<String>,
    /// Description template, e.g. `"Order {order_id}"`.
    pub order_description: Option<String>,
    /// Payment page template, absolute or relative to the site.
    pub template_url: Option<String>,
}

/// How the PSP authenticates the request.
#[derive(Debug)]
pub enum OutboundAuth {
    /// `SHASIGN` over the SHA-IN signable set.
    Signature(ShaSigner),
    /// `SESSIONID` token instead of a signature.
    SessionToken(SessionTokenIssuer),
}

/// Absolute URLs the PSP sends the customer back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrls {
    pub accept: String,
    pub decline: String,
    pub exception: String,
    pub cancel: String,
}

impl CallbackUrls {
    /// Builds the callback URLs for a site root such as `https://shop.example`.
    pub fn for_site(base_url: &str) -> Self {
        let root = format!("{}{}", base_url.trim_end_matches('/'), CALLBACK_PATH);
        Self {
            accept: format!("{}/accept", root),
            decline: format!("{}/decline", root),
            exception: format!("{}/exception", root),
            cancel: format!("{}/cancel", root),
        }
    }
}

/// Hidden form fields, keyed by PSP parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SignedFormFields(BTreeMap<String, String>);

impl SignedFormFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

/// Assembles and signs the outbound request.
#[derive(Debug)]
pub struct PaymentRequestBuilder {
    merchant: MerchantProfile,
    auth: OutboundAuth,
}

impl PaymentRequestBuilder {
    pub fn new(merchant: MerchantProfile, auth: OutboundAuth) -> Self {
        Self { merchant, auth }
    }

    pub fn merchant(&self) -> &MerchantProfile {
        &self.merchant
    }

    /// Builds the signed form fields for `order`.
    ///
    /// Absent customer data becomes an empty string, and empty values are
    /// left out of the signature.
    ///
    /// # Errors
    ///
    /// - `OrderNotPayable` if the order already has a final outcome
    /// - `CurrencyMismatch` if the order is not in the merchant currency
    /// - `InvalidAmount` if the total cannot be expressed in minor units
    pub fn build(
        &self,
        order: &Order,
        billing: Option<&BillingAddress>,
        customer_email: Option<&str>,
        callback_base_url: &str,
    ) -> Result<SignedFormFields, PaymentError> {
        if !order.status.is_awaiting_payment() {
            return Err(PaymentError::OrderNotPayable {
                order_id: order.id,
                status: order.status,
            });
        }
        if !order.currency.eq_ignore_ascii_case(&self.merchant.currency) {
            return Err(PaymentError::CurrencyMismatch {
                expected: self.merchant.currency.to_uppercase(),
                actual: order.currency.to_uppercase(),
            });
        }

        let amount = money::to_minor_units(order.total)?;
        let currency = self.merchant.currency.to_uppercase();
        let empty = BillingAddress::default();
        let address = billing.unwrap_or(&empty);
        let urls = CallbackUrls::for_site(callback_base_url);

        let mut fields = BTreeMap::new();
        let mut put = |name: &str, value: &str| {
            fields.insert(name.to_string(), value.to_string());
        };

        put("PSPID", &self.merchant.pspid);
        put("CURRENCY", &currency);
        put("LANGUAGE", &self.merchant.language);
        put("TITLE", self.merchant.title.as_deref().unwrap_or_default());
        put("ORDERID", &order.id.to_string());
        put("AMOUNT", &amount.to_string());
        put("CN", &address.name);
        put("EMAIL", customer_email.unwrap_or_default());
        put("OWNERZIP", &address.zip_code);
        put("OWNERADDRESS", &address.address);
        put("OWNERADDRESS2", &address.address2);
        put("OWNERTOWN", &address.city);
        put("OWNERCTY", &address.country);
        put("ACCEPTURL", &urls.accept);
        put("DECLINEURL", &urls.decline);
        put("EXCEPTIONURL", &urls.exception);
        put("CANCELURL", &urls.cancel);
        put("TP", &self.template_url(callback_base_url));
        put("COM", &self.description(order));

        match &self.auth {
            OutboundAuth::Signature(signer) => {
                let payload: SignaturePayload = fields.iter().collect();
                fields.insert(SIGNATURE_PARAMETER.to_string(), signer.sign(&payload));
            }
            OutboundAuth::SessionToken(issuer) => {
                fields.insert(
                    SESSION_TOKEN_PARAMETER.to_string(),
                    issuer.issue(order.id, amount, &currency),
                );
            }
        }

        Ok(SignedFormFields(fields))
    }

    fn template_url(&self, base_url: &str) -> String {
        match self.merchant.template_url.as_deref() {
            None => String::new(),
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                url.to_string()
            }
            Some(path) => format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
        }
    }

    fn description(&self, order: &Order) -> String {
        self.merchant
            .order_description
            .as_deref()
            .map(|template| template.replace(ORDER_ID_PLACEHOLDER, &order.id.to_string()))
            .unwrap_or_default()
    }
}
