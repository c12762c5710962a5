//! The Stripe implementation of the engine's [`PaymentGateway`].
use async_trait::async_trait;
use log::*;
use raiz_common::Secret;
use raiz_engine::traits::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, WebhookEvent};
use stripe_tools::{verify_webhook, CheckoutSessionParams, StripeApi, StripeApiError, StripeConfig, DEFAULT_TOLERANCE_SECS};

pub struct StripeGateway {
    api: StripeApi,
    webhook_secret: Secret<String>,
    frontend_base_url: String,
}

impl StripeGateway {
    pub fn new(config: StripeConfig, frontend_base_url: &str) -> Result<Self, StripeApiError> {
        let webhook_secret = config.webhook_secret.clone();
        let api = StripeApi::new(config)?;
        let frontend_base_url = frontend_base_url.trim_end_matches('/').to_string();
        Ok(Self { api, webhook_secret, frontend_base_url })
    }

    pub fn success_url(&self, order_id: i64) -> String {
        format!("{}/app/dashboard?payment=success&order_id={order_id}", self.frontend_base_url)
    }

    pub fn cancel_url(&self, order_id: i64) -> String {
        format!("{}/checkout/{order_id}?payment=cancelled", self.frontend_base_url)
    }

    fn session_params(&self, request: CheckoutRequest) -> CheckoutSessionParams {
        CheckoutSessionParams {
            order_id: request.order_id,
            amount: request.price,
            product_name: request.description,
            price_id: self.api.config().catalogue_price().map(String::from),
            success_url: self.success_url(request.order_id),
            cancel_url: self.cancel_url(request.order_id),
        }
    }
}

fn to_gateway_error(e: StripeApiError) -> GatewayError {
    match e {
        StripeApiError::Configuration(s) => GatewayError::Configuration(s),
        StripeApiError::InvalidSignature(s) | StripeApiError::InvalidPayload(s) => GatewayError::InvalidSignature(s),
        e => GatewayError::Provider(e.to_string()),
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        let params = self.session_params(request);
        let session = self.api.create_checkout_session(&params).await.map_err(to_gateway_error)?;
        let url = session
            .url
            .ok_or_else(|| GatewayError::Provider(format!("Checkout session {} has no payment url", session.id)))?;
        Ok(CheckoutSession { id: session.id, url })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, GatewayError> {
        let event = verify_webhook(payload, signature, self.webhook_secret.reveal(), DEFAULT_TOLERANCE_SECS)
            .map_err(to_gateway_error)?;
        trace!("💳️ Verified Stripe event {} ({})", event.id, event.event_type);
        let order_reference = event.order_reference();
        Ok(WebhookEvent { event_type: event.event_type, order_reference })
    }
}
