//! BuildCheckoutHandler - Query handler for the signed checkout form.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::foundation::OrderId;
use crate::domain::payment::{PaymentError, PaymentRequestBuilder, SignedFormFields};
use crate::ports::OrderRepository;

/// Query for the checkout form of one order.
#[derive(Debug, Clone)]
pub struct BuildCheckoutQuery {
    pub order_id: OrderId,
    /// Scheme and host the callback URLs are built from.
    pub site_base_url: String,
}

/// Everything the browser needs to post the customer to the PSP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutForm {
    pub action_url: String,
    pub fields: SignedFormFields,
}

/// Handler building the signed checkout form.
pub struct BuildCheckoutHandler {
    orders: Arc<dyn OrderRepository>,
    builder: Arc<PaymentRequestBuilder>,
    action_url: String,
}

impl BuildCheckoutHandler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        builder: Arc<PaymentRequestBuilder>,
        action_url: impl Into<String>,
    ) -> Self {
        Self {
            orders,
            builder,
            action_url: action_url.into(),
        }
    }

    pub async fn handle(&self, query: BuildCheckoutQuery) -> Result<CheckoutForm, PaymentError> {
        let order = self
            .orders
            .find_by_id(query.order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(query.order_id))?;

        let fields = self.builder.build(
            &order,
            order.billing_address.as_ref(),
            order.customer_email.as_deref(),
            &query.site_base_url,
        )?;

        tracing::debug!(order_id = %order.id, fields = fields.len(), "Checkout form built");

        Ok(CheckoutForm {
            action_url: self.action_url.clone(),
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryOrderRepository;
    use crate::domain::order::{BillingAddress, Order};
    use crate::domain::payment::{
        MerchantProfile, OutboundAuth, ShaAlgorithm, ShaSigner, SignableSet,
    };
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use std::str::FromStr;

    const ACTION: &str = "https://viveum.v-psp.com/ncol/test/orderstandard_UTF8.asp";

    fn handler(orders: InMemoryOrderRepository) -> BuildCheckoutHandler {
        let merchant = MerchantProfile {
            pspid: "viveum-test".to_string(),
            currency: "EUR".to_string(),
            language: "de_DE".to_string(),
            title: None,
            order_description: None,
            template_url: None,
        };
        let signer = ShaSigner::new(
            SignableSet::sha_in(),
            SecretString::new("sha-in-secret".to_string()),
            ShaAlgorithm::Sha512,
        );
        let builder = PaymentRequestBuilder::new(merchant, OutboundAuth::Signature(signer));
        BuildCheckoutHandler::new(Arc::new(orders), Arc::new(builder), ACTION)
    }

    fn query(id: i64) -> BuildCheckoutQuery {
        BuildCheckoutQuery {
            order_id: OrderId::new(id).unwrap(),
            site_base_url: "https://shop.example".to_string(),
        }
    }

    #[tokio::test]
    async fn builds_form_from_stored_order() {
        let order = Order::new(OrderId::new(7).unwrap(), Decimal::from_str("49.90").unwrap(), "EUR")
            .unwrap()
            .with_billing_address(BillingAddress {
                name: "Grace Hopper".to_string(),
                city: "Arlington".to_string(),
                ..Default::default()
            })
            .with_customer_email("grace@example.com");
        let handler = handler(InMemoryOrderRepository::with_orders([order]));

        let form = handler.handle(query(7)).await.unwrap();

        assert_eq!(form.action_url, ACTION);
        assert_eq!(form.fields.get("AMOUNT"), Some("4990"));
        assert_eq!(form.fields.get("CN"), Some("Grace Hopper"));
        assert_eq!(form.fields.get("EMAIL"), Some("grace@example.com"));
        assert_eq!(form.fields.get("SHASIGN").map(str::len), Some(128));
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let handler = handler(InMemoryOrderRepository::new());

        let err = handler.handle(query(7)).await.unwrap_err();

        assert!(matches!(err, PaymentError::OrderNotFound(_)));
    }
}
