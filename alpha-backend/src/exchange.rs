//! Binance account snapshots.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_BINANCE_API_URL: &str = "https://api.binance.com";
const ACCOUNT_PATH: &str = "/sapi/v3/account";
const API_KEY_HEADER: &str = "X-MBX-APIKEY";
const RECV_WINDOW_MS: u64 = 5000;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("exchange request failed: {0}")]
    Http(String),

    #[error("exchange returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected exchange response: {0}")]
    Decode(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub available: f64,
    pub locked: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub balances: Vec<Balance>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(default)]
    balances: Vec<RawBalance>,
}

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn fetch_wallet_summary(
        &self,
        api_key: &str,
        api_secret: &str,
    ) -> Result<WalletSummary, ExchangeError>;
}

#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    http: reqwest::Client,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn signed_query(&self, api_secret: &str, timestamp_ms: u64) -> Result<String, ExchangeError> {
        let query = format!("recvWindow={RECV_WINDOW_MS}&timestamp={timestamp_ms}");
        let signature = sign_query(&query, api_secret)?;
        Ok(format!("{query}&signature={signature}"))
    }
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new(DEFAULT_BINANCE_API_URL)
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    async fn fetch_wallet_summary(
        &self,
        api_key: &str,
        api_secret: &str,
    ) -> Result<WalletSummary, ExchangeError> {
        let query = self.signed_query(api_secret, now_millis())?;
        let url = format!("{}{}?{}", self.base_url, ACCOUNT_PATH, query);

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(|err| ExchangeError::Http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let account: AccountResponse = response
            .json()
            .await
            .map_err(|err| ExchangeError::Decode(err.to_string()))?;
        let balances = non_zero_balances(account.balances);
        debug!("Fetched {} Binance balances", balances.len());

        Ok(WalletSummary {
            balances,
            fetched_at: Utc::now(),
        })
    }
}

/// Hex HMAC-SHA256 of the query string, as Binance's signed endpoints expect.
pub fn sign_query(query: &str, api_secret: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .map_err(|_| ExchangeError::Signing("hmac init failed".into()))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Keep balances with a positive free or locked amount. Amounts that do not
/// parse count as zero.
fn non_zero_balances(raw: Vec<RawBalance>) -> Vec<Balance> {
    raw.into_iter()
        .filter_map(|balance| {
            let available = balance.free.trim().parse::<f64>().unwrap_or(0.0);
            let locked = balance.locked.trim().parse::<f64>().unwrap_or(0.0);
            if available > 0.0 || locked > 0.0 {
                Some(Balance {
                    asset: balance.asset,
                    available,
                    locked,
                })
            } else {
                None
            }
        })
        .collect()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
