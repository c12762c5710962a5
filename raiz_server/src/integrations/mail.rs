//! Email delivery.
//!
//! Messages are posted as JSON to a transactional mail provider's HTTP API. When no provider is configured, messages
//! are written to the log instead, which is what you want during development.
use std::time::Duration;

use log::*;
use raiz_common::Secret;
use raiz_engine::db_types::EmailMessage;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::config::MailConfig;

const MAIL_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Error)]
pub enum MailError {
    #[error("Could not initialize the mail client. {0}")]
    Initialization(String),
    #[error("Could not reach the mail provider. {0}")]
    RequestError(String),
    #[error("The mail provider rejected the message ({status}). {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

#[derive(Clone)]
pub enum Mailer {
    Http { client: Client, url: String, api_key: Secret<String>, sender: String },
    Log { sender: String },
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let sender = config.sender.clone();
        match &config.api_url {
            Some(url) => {
                let client = Client::builder()
                    .timeout(MAIL_REQUEST_TIMEOUT)
                    .build()
                    .map_err(|e| MailError::Initialization(e.to_string()))?;
                info!("📧️ Delivering email through {url}");
                Ok(Mailer::Http { client, url: url.clone(), api_key: config.api_key.clone(), sender })
            },
            None => Ok(Mailer::Log { sender }),
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            Mailer::Http { sender, .. } | Mailer::Log { sender } => sender,
        }
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        match self {
            Mailer::Log { sender } => {
                info!(
                    "📧️ [not delivered] From: {sender} To: {} Subject: {}\n{}",
                    message.to_email, message.subject, message.body
                );
                Ok(())
            },
            Mailer::Http { client, url, api_key, sender } => {
                let mail =
                    OutgoingMail { from: sender, to: &message.to_email, subject: &message.subject, text: &message.body };
                let mut request = client.post(url).json(&mail);
                if !api_key.is_empty() {
                    request = request.bearer_auth(api_key.reveal());
                }
                let response = request.send().await.map_err(|e| MailError::RequestError(e.to_string()))?;
                let status = response.status();
                if status.is_success() {
                    debug!("📧️ '{}' delivered to the mail provider", message.subject);
                    Ok(())
                } else {
                    let message = response.text().await.unwrap_or_default();
                    Err(MailError::Rejected { status: status.as_u16(), message })
                }
            },
        }
    }
}
