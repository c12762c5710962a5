//! Stripe webhook verification.
//!
//! Stripe signs each delivery with the endpoint secret. The `Stripe-Signature` header looks like
//! `t=1492774577,v1=5257a869e7ec...,v1=...` where `t` is the unix timestamp of the delivery and each `v1` is a hex
//! encoded HMAC-SHA256 of `"{t}.{payload}"`. Several `v1` entries may be present while a secret is being rolled.
use chrono::Utc;
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

use crate::{data_objects::StripeEvent, StripeApiError};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
/// Deliveries older (or newer) than this are refused, to limit replay attacks.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, StripeApiError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for item in header.split(',') {
            let Some((key, value)) = item.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    let t = value
                        .parse::<i64>()
                        .map_err(|_| StripeApiError::InvalidSignature(format!("'{value}' is not a timestamp")))?;
                    timestamp = Some(t);
                },
                "v1" => signatures.push(value.to_string()),
                _ => {},
            }
        }
        let timestamp =
            timestamp.ok_or_else(|| StripeApiError::InvalidSignature("The header has no timestamp".into()))?;
        if signatures.is_empty() {
            return Err(StripeApiError::InvalidSignature("The header has no v1 signature".into()));
        }
        Ok(Self { timestamp, signatures })
    }
}

/// Computes the hex-encoded `v1` signature of a payload.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, StripeApiError> {
    let mac = signed_payload_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn signed_payload_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, StripeApiError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| StripeApiError::Configuration(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verifies a webhook delivery and parses the event.
///
/// The payload must be the raw request body, exactly as received. Comparison is constant-time.
pub fn verify_webhook(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: i64,
) -> Result<StripeEvent, StripeApiError> {
    verify_webhook_at(payload, signature_header, secret, tolerance_secs, Utc::now().timestamp())
}

pub(crate) fn verify_webhook_at(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<StripeEvent, StripeApiError> {
    if secret.trim().is_empty() {
        return Err(StripeApiError::Configuration("The webhook signing secret is not set".into()));
    }
    let header = SignatureHeader::parse(signature_header)?;
    if now.abs_diff(header.timestamp) > tolerance_secs.unsigned_abs() {
        warn!("💳️ Webhook timestamp {} is outside the {tolerance_secs}s tolerance", header.timestamp);
        return Err(StripeApiError::InvalidSignature("The timestamp is outside the tolerance zone".into()));
    }
    let mac = signed_payload_mac(secret, header.timestamp, payload)?;
    let valid = header
        .signatures
        .iter()
        .filter_map(|sig| hex::decode(sig).ok())
        .any(|sig| mac.clone().verify_slice(&sig).is_ok());
    if !valid {
        warn!("💳️ No matching webhook signature found");
        return Err(StripeApiError::InvalidSignature("No signatures found matching the expected signature".into()));
    }
    trace!("💳️ Webhook signature check ✅️");
    serde_json::from_slice::<StripeEvent>(payload).map_err(|e| StripeApiError::InvalidPayload(e.to_string()))
}
