use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Clone, Serialize)]
pub struct Config {
    pub base_price: f64,
    pub escalated_base: f64,
    pub escalation_growth: f64,
    pub radius_start_m: f64,
    pub radius_floor_m: f64,
    pub radius_decay: f64,
    pub abuse_window_secs: u64,
    pub abuse_max_attempts: u32,
    pub charge_timeout_ms: u64,
    pub sqlite_path: String,
    pub payment_base: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    #[serde(skip_serializing)]
    pub api_secret: Option<String>,
    pub campaign_lat: f64,
    pub campaign_lng: f64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            base_price: std::env::var("BASE_PRICE").ok().and_then(|v| v.parse().ok()).unwrap_or(7.99),
            escalated_base: std::env::var("ESCALATED_BASE").ok().and_then(|v| v.parse().ok()).unwrap_or(29.99),
            escalation_growth: std::env::var("ESCALATION_GROWTH").ok().and_then(|v| v.parse().ok()).unwrap_or(1.10),
            radius_start_m: std::env::var("RADIUS_START_M").ok().and_then(|v| v.parse().ok()).unwrap_or(100_000.0),
            radius_floor_m: std::env::var("RADIUS_FLOOR_M").ok().and_then(|v| v.parse().ok()).unwrap_or(5_000.0),
            radius_decay: std::env::var("RADIUS_DECAY").ok().and_then(|v| v.parse().ok()).unwrap_or(0.95),
            abuse_window_secs: std::env::var("ABUSE_WINDOW_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30),
            abuse_max_attempts: std::env::var("ABUSE_MAX_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
            charge_timeout_ms: std::env::var("CHARGE_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(10_000),
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or_else(|_| "./buzz.sqlite".to_string()),
            payment_base: std::env::var("PAYMENT_BASE").unwrap_or_else(|_| "https://pay.example.com".to_string()),
            api_key: std::env::var("PAY_API_KEY").ok(),
            api_secret: std::env::var("PAY_API_SECRET").ok(),
            campaign_lat: std::env::var("CAMPAIGN_LAT").ok().and_then(|v| v.parse().ok()).unwrap_or(39.4699),
            campaign_lng: std::env::var("CAMPAIGN_LNG").ok().and_then(|v| v.parse().ok()).unwrap_or(-0.3763),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// SHA256 over the serialized config. Secrets are excluded from
    /// serialization, so the hash is safe to log in run manifests.
    pub fn config_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_json().as_bytes());
        hex::encode(hasher.finalize())
    }
}
