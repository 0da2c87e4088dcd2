//! Service configuration.

use std::{env, path::PathBuf, time::Duration};

use alpha_chain::ChainConfig;
use alpha_common::{validate::parse_address, SaltPolicy};
use anyhow::{anyhow, Context, Result};

use crate::{exchange::DEFAULT_BINANCE_API_URL, token::DEFAULT_TOKEN_TTL};

pub const PORT_ENV: &str = "PORT";
pub const RPC_URL_ENV: &str = "ETHEREUM_RPC_URL";
pub const CHAIN_ID_ENV: &str = "ETHEREUM_CHAIN_ID";
pub const OPERATOR_KEY_ENV: &str = "ETHEREUM_OPERATOR_KEY";
pub const FACTORY_ADDRESS_ENV: &str = "EMAIL_AA_FACTORY_ADDRESS";
pub const VERIFIER_ADDRESS_ENV: &str = "ZK_EMAIL_VERIFIER_ADDRESS";
pub const ALLOW_UNVERIFIED_ENV: &str = "ZK_EMAIL_ALLOW_UNVERIFIED_PROOFS";
pub const SESSION_TTL_ENV: &str = "ZK_EMAIL_SESSION_TTL_SECS";
pub const SALT_POLICY_ENV: &str = "SALT_POLICY";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_TTL_ENV: &str = "JWT_TTL_SECS";
pub const BINANCE_API_URL_ENV: &str = "BINANCE_API_URL";
pub const PROFILE_DB_ENV: &str = "ALPHA_PROFILE_DB";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CHAIN_ID: u64 = 1;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub chain: ChainConfig,
    /// Accept every proof when no verifier is configured.
    pub allow_unverified_proofs: bool,
    /// Pending sessions older than this are purged. `None` keeps them for
    /// the process lifetime.
    pub session_ttl: Option<Duration>,
    pub salt_policy: SaltPolicy,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub binance_api_url: String,
    /// sled database for profiles; in memory when unset.
    pub profile_db: Option<PathBuf>,
}

impl AppConfig {
    /// Load `.env.local` then `.env` (existing variables win), then read the
    /// environment.
    pub fn load() -> Result<Self> {
        dotenvy::from_filename(".env.local").ok();
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match var(PORT_ENV) {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("{PORT_ENV} must be a port number"))?,
            None => DEFAULT_PORT,
        };

        let rpc_url = var(RPC_URL_ENV).with_context(|| format!("{RPC_URL_ENV} must be set"))?;
        let chain_id = match var(CHAIN_ID_ENV) {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("{CHAIN_ID_ENV} must be an integer"))?,
            None => DEFAULT_CHAIN_ID,
        };
        let factory_address = var(FACTORY_ADDRESS_ENV)
            .map(|raw| parse_address(FACTORY_ADDRESS_ENV, &raw))
            .transpose()
            .map_err(|err| anyhow!(err))?;
        let verifier_address = var(VERIFIER_ADDRESS_ENV)
            .map(|raw| parse_address(VERIFIER_ADDRESS_ENV, &raw))
            .transpose()
            .map_err(|err| anyhow!(err))?;

        let allow_unverified_proofs = var(ALLOW_UNVERIFIED_ENV)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let session_ttl = var(SESSION_TTL_ENV)
            .map(|raw| {
                raw.parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{SESSION_TTL_ENV} must be a number of seconds"))
            })
            .transpose()?;

        let salt_policy = match var(SALT_POLICY_ENV) {
            Some(raw) => raw
                .parse::<SaltPolicy>()
                .map_err(|err| anyhow!("{SALT_POLICY_ENV}: {err}"))?,
            None => SaltPolicy::default(),
        };

        let jwt_secret =
            var(JWT_SECRET_ENV).with_context(|| format!("{JWT_SECRET_ENV} env var missing"))?;
        let jwt_ttl = match var(JWT_TTL_ENV) {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .with_context(|| format!("{JWT_TTL_ENV} must be a number of seconds"))?,
            ),
            None => DEFAULT_TOKEN_TTL,
        };

        let binance_api_url =
            var(BINANCE_API_URL_ENV).unwrap_or_else(|| DEFAULT_BINANCE_API_URL.to_string());
        let profile_db = var(PROFILE_DB_ENV).map(PathBuf::from);

        Ok(Self {
            port,
            chain: ChainConfig {
                rpc_url,
                chain_id,
                operator_key: var(OPERATOR_KEY_ENV),
                factory_address,
                verifier_address,
            },
            allow_unverified_proofs,
            session_ttl,
            salt_policy,
            jwt_secret,
            jwt_ttl,
            binance_api_url,
            profile_db,
        })
    }
}
