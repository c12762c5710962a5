use raiz_common::{Cents, DEFAULT_CURRENCY_CODE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::helpers::stripe_unit_amount;

/// Everything needed to open a hosted checkout for a single item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionParams {
    /// Stored in the session metadata as `order_id`, and echoed back in the webhook.
    pub order_id: i64,
    pub amount: Cents,
    pub product_name: String,
    /// If set, this catalogue price is charged instead of `amount`.
    pub price_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSessionParams {
    /// The session as a Stripe form-encoded request body.
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
        ];
        match self.price_id.as_deref() {
            Some(price) if price.starts_with("price_") => {
                form.push(("line_items[0][price]".into(), price.to_string()));
            },
            _ => {
                form.push(("line_items[0][price_data][currency]".into(), DEFAULT_CURRENCY_CODE.to_string()));
                form.push(("line_items[0][price_data][product_data][name]".into(), self.product_name.clone()));
                form.push(("line_items[0][price_data][unit_amount]".into(), stripe_unit_amount(self.amount)));
            },
        }
        form.push(("success_url".into(), self.success_url.clone()));
        form.push(("cancel_url".into(), self.cancel_url.clone()));
        form.push(("metadata[order_id]".into(), self.order_id.to_string()));
        form
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeEventData {
    #[serde(default)]
    pub object: Value,
}

impl StripeEvent {
    /// The `order_id` stored in the event object's metadata. Stripe metadata values are strings, but numbers are
    /// accepted too.
    pub fn order_reference(&self) -> Option<String> {
        match &self.data.object["metadata"]["order_id"] {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
