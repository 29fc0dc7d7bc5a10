//! Session-token authentication for the outbound request.
//!
//! Some merchant accounts authenticate the checkout with an opaque session
//! token instead of `SHASIGN`. The token is an HMAC-SHA256 over the order id,
//! amount in minor units and currency, keyed with the SHA-IN passphrase. The
//! PSP echoes it back on the confirmation, where it is recomputed from the
//! confirmed values.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::domain::foundation::OrderId;

/// Name of the token parameter on the outbound form.
pub const SESSION_TOKEN_PARAMETER: &str = "SESSIONID";

/// Issues and checks session tokens.
#[derive(Debug, Clone)]
pub struct SessionTokenIssuer {
    secret: SecretString,
}

impl SessionTokenIssuer {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Returns the lowercase hex token binding order, amount and currency.
    pub fn issue(&self, order_id: OrderId, amount_minor: i64, currency: &str) -> String {
        hex::encode(self.mac(order_id, amount_minor, currency).finalize().into_bytes())
    }

    /// Checks a received token against the confirmed values.
    ///
    /// Tokens that are not valid hex never match.
    pub fn verify(&self, order_id: OrderId, amount_minor: i64, currency: &str, token: &str) -> bool {
        let Ok(received) = hex::decode(token.trim()) else {
            return false;
        };
        self.mac(order_id, amount_minor, currency)
            .verify_slice(&received)
            .is_ok()
    }

    fn mac(&self, order_id: OrderId, amount_minor: i64, currency: &str) -> Hmac<Sha256> {
        let message = format!(
            "ORDERID={};AMOUNT={};CURRENCY={}",
            order_id,
            amount_minor,
            currency.to_uppercase()
        );
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC accepts any key");
        mac.update(message.as_bytes());
        mac
    }
}
