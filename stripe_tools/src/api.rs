use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    config::StripeConfig,
    data_objects::{CheckoutSessionParams, StripeCheckoutSession},
    helpers::is_plausible_secret_key,
    StripeApiError,
};

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    /// Creates a new client. A missing or malformed API key is only reported when a request is made, so that the
    /// server can start without Stripe credentials.
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        if is_plausible_secret_key(config.api_key.reveal()) {
            let val = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal().trim()))
                .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
            headers.insert(AUTHORIZATION, val);
        }
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.config.api_url.trim_end_matches('/'))
    }

    fn check_api_key(&self) -> Result<(), StripeApiError> {
        if self.config.api_key.is_empty() {
            return Err(StripeApiError::Configuration("The Stripe API key is not set".into()));
        }
        if !is_plausible_secret_key(self.config.api_key.reveal()) {
            return Err(StripeApiError::Configuration("The Stripe API key must be a secret key (sk_...)".into()));
        }
        Ok(())
    }

    pub async fn form_post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, StripeApiError> {
        self.check_api_key()?;
        let url = self.url(path);
        trace!("💳️ Sending form POST to {url}");
        let response =
            self.client.post(url).form(form).send().await.map_err(|e| StripeApiError::RequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("💳️ Stripe request successful. {}", response.status());
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| StripeApiError::RequestError(e.to_string()))?;
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(String::from))
                .unwrap_or(body);
            Err(StripeApiError::QueryError { status, message })
        }
    }

    /// Creates a hosted Checkout Session for a single item and returns its id and payment URL.
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<StripeCheckoutSession, StripeApiError> {
        debug!("💳️ Creating checkout session for order #{}", params.order_id);
        let session = self.form_post::<StripeCheckoutSession>("/checkout/sessions", &params.to_form()).await?;
        if session.url.is_none() {
            return Err(StripeApiError::JsonError(format!("Checkout session {} has no payment url", session.id)));
        }
        info!("💳️ Created checkout session {} for order #{}", session.id, params.order_id);
        Ok(session)
    }
}
