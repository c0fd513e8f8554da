use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::auth::UserId;
use crate::config::Config;
use crate::period;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct ChargeReceipt {
    pub charge_id: String,
    pub amount: f64,
    pub ts: u64,
}

/// Payment capture collaborator. At most one charge attempt is made per
/// activation; retries (if any) are a caller concern.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, user: &UserId, amount: f64, idempotency_key: &str)
        -> Result<ChargeReceipt>;
}

/// Idempotency key for one charge attempt: stable for a given
/// (user, period, generation), so a provider-side replay of the same
/// activation cannot double-capture.
pub fn idempotency_key(user: &UserId, period: &str, generation: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(period.as_bytes());
    hasher.update(b"|");
    hasher.update(generation.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Sign the canonical charge payload with HMAC-SHA256, hex-encoded.
fn sign_charge(payload: &str, secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow!("HMAC error: {}", e))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

// =============================================================================
// HTTP gateway
// =============================================================================

pub struct HttpGateway {
    client: Client,
    base: String,
    api_key: String,
    api_secret: String,
}

#[derive(Deserialize, Debug)]
struct ChargeResponse {
    charge_id: String,
    status: String,
}

#[derive(Deserialize, Debug)]
struct GatewayError {
    code: i64,
    message: String,
}

impl HttpGateway {
    pub fn new(cfg: &Config) -> Result<Self> {
        let api_key = cfg.api_key.clone().ok_or_else(|| anyhow!("missing PAY_API_KEY"))?;
        let api_secret = cfg
            .api_secret
            .clone()
            .ok_or_else(|| anyhow!("missing PAY_API_SECRET"))?;
        Ok(Self {
            client: Client::new(),
            base: cfg.payment_base.clone(),
            api_key,
            api_secret,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn charge(
        &self,
        user: &UserId,
        amount: f64,
        idempotency_key: &str,
    ) -> Result<ChargeReceipt> {
        let ts = period::now_ts();
        // Canonical payload: keys in alphabetical order, amount in cents
        // precision, same string on both sides of the signature.
        let payload = format!(
            "amount={:.2}&idempotency_key={}&ts={}&user={}",
            amount, idempotency_key, ts, user
        );
        let signature = sign_charge(&payload, &self.api_secret)?;

        let url = format!("{}/v1/charges", self.base);
        let resp = self
            .client
            .post(&url)
            .header("X-BUZZ-APIKEY", &self.api_key)
            .header("X-BUZZ-SIGNATURE", signature)
            .json(&serde_json::json!({
                "user": user.as_str(),
                "amount": format!("{:.2}", amount),
                "currency": "EUR",
                "idempotency_key": idempotency_key,
                "ts": ts,
            }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let err: GatewayError = serde_json::from_str(&body).unwrap_or(GatewayError {
                code: -1,
                message: body.clone(),
            });
            return Err(anyhow!("charge rejected: {} - {}", err.code, err.message));
        }

        let parsed: ChargeResponse = serde_json::from_str(&body)?;
        if parsed.status != "captured" {
            return Err(anyhow!("charge not captured: {}", parsed.status));
        }

        Ok(ChargeReceipt {
            charge_id: parsed.charge_id,
            amount,
            ts,
        })
    }
}

// =============================================================================
// Null gateway
// =============================================================================

// Stub implementation to make integration explicit. Captures everything.
pub struct NullGateway;

#[async_trait]
impl PaymentGateway for NullGateway {
    async fn charge(
        &self,
        _user: &UserId,
        amount: f64,
        idempotency_key: &str,
    ) -> Result<ChargeReceipt> {
        Ok(ChargeReceipt {
            charge_id: format!("stub-{}", &idempotency_key[..12.min(idempotency_key.len())]),
            amount,
            ts: period::now_ts(),
        })
    }
}
