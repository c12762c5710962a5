use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use raiz_engine::traits::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, WebhookEvent};
use serde_json::Value;

pub const GOOD_SIGNATURE: &str = "t=1,v1=good";

/// A payment gateway that accepts a single known signature and reads the event straight from the payload.
#[derive(Default)]
pub struct StubGateway {
    pub sessions_created: AtomicUsize,
    pub fail_checkout: bool,
    pub last_request: Mutex<Option<CheckoutRequest>>,
}

impl StubGateway {
    pub fn failing() -> Self {
        Self { fail_checkout: true, ..Default::default() }
    }
}

pub fn completed_event(order_id: i64) -> Vec<u8> {
    let event = serde_json::json!({
        "type": "checkout.session.completed",
        "data": { "object": { "metadata": { "order_id": order_id.to_string() } } }
    });
    event.to_string().into_bytes()
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        if self.fail_checkout {
            return Err(GatewayError::Provider("card network on fire".into()));
        }
        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst);
        let id = format!("cs_test_{}_{n}", request.order_id);
        let url = format!("https://checkout.example.com/pay/{id}");
        *self.last_request.lock().unwrap() = Some(request);
        Ok(CheckoutSession { id, url })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, GatewayError> {
        if signature != GOOD_SIGNATURE {
            return Err(GatewayError::InvalidSignature("signature mismatch".into()));
        }
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| GatewayError::InvalidSignature(e.to_string()))?;
        let event_type = value["type"].as_str().unwrap_or_default().to_string();
        let order_reference = value["data"]["object"]["metadata"]["order_id"].as_str().map(String::from);
        Ok(WebhookEvent { event_type, order_reference })
    }
}
