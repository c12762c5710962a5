use log::*;
use raiz_common::Secret;

pub const DEFAULT_STRIPE_API_URL: &str = "https://api.stripe.com";

#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// The secret API key. Live and test keys both start with `sk_`.
    pub api_key: Secret<String>,
    /// The endpoint signing secret used to verify webhook deliveries (`whsec_...`).
    pub webhook_secret: Secret<String>,
    /// A pre-configured Stripe price. When absent, or not a `price_` id, the order price is sent inline.
    pub price_id: Option<String>,
    pub api_url: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::default(),
            webhook_secret: Secret::default(),
            price_id: None,
            api_url: DEFAULT_STRIPE_API_URL.to_string(),
        }
    }
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_key = Secret::new(std::env::var("RAIZ_STRIPE_API_KEY").unwrap_or_else(|_| {
            warn!("💳️ RAIZ_STRIPE_API_KEY not set. Checkout sessions cannot be created.");
            String::default()
        }));
        let webhook_secret = Secret::new(std::env::var("RAIZ_STRIPE_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("💳️ RAIZ_STRIPE_WEBHOOK_SECRET not set. Stripe webhooks will be refused.");
            String::default()
        }));
        let price_id = std::env::var("RAIZ_STRIPE_PRICE_ID").ok().filter(|s| !s.trim().is_empty());
        let api_url = std::env::var("RAIZ_STRIPE_API_URL").unwrap_or_else(|_| DEFAULT_STRIPE_API_URL.to_string());
        Self { api_key, webhook_secret, price_id, api_url }
    }

    /// The configured price id, if it is a real Stripe price id.
    pub fn catalogue_price(&self) -> Option<&str> {
        self.price_id.as_deref().filter(|p| p.starts_with("price_"))
    }
}
