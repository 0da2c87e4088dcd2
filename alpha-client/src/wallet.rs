//! Embedded smart-account wallet derived from an email address.

use std::env;

use alpha_chain::{
    BundlerAccountProvider, OwnerKey, SmartAccount, SmartAccountConfig, SmartAccountProvider,
    SmartAccountProviderKind,
};
use alpha_common::validate::parse_address;
use anyhow::{anyhow, Context, Result};
use ethers::types::U256;
use tracing::info;

pub const PROVIDER_ENV: &str = "SMART_ACCOUNT_PROVIDER";
pub const RPC_URL_ENV: &str = "SMART_ACCOUNT_RPC_URL";
pub const BUNDLER_URL_ENV: &str = "BUNDLER_URL";
pub const ENTRY_POINT_ENV: &str = "ENTRY_POINT_ADDRESS";
pub const FACTORY_ADDRESS_ENV: &str = "SMART_ACCOUNT_FACTORY_ADDRESS";
pub const ACCOUNT_SALT_ENV: &str = "SMART_ACCOUNT_SALT";
pub const SECRET_ENV: &str = "EMBEDDED_WALLET_SECRET";

#[derive(Clone, Debug)]
pub struct EmbeddedWalletConfig {
    pub account: SmartAccountConfig,
    pub secret: String,
}

impl EmbeddedWalletConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Blank values count as unset. The provider defaults to `erc4337`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let kind = match var(PROVIDER_ENV) {
            Some(raw) => raw
                .parse::<SmartAccountProviderKind>()
                .map_err(|err| anyhow!("{PROVIDER_ENV}: {err}"))?,
            None => SmartAccountProviderKind::Erc4337,
        };
        let rpc_url = var(RPC_URL_ENV).with_context(|| format!("{RPC_URL_ENV} must be set"))?;
        let bundler_url =
            var(BUNDLER_URL_ENV).with_context(|| format!("{BUNDLER_URL_ENV} must be set"))?;
        let entry_point = var(ENTRY_POINT_ENV)
            .map(|raw| parse_address(ENTRY_POINT_ENV, &raw))
            .transpose()
            .map_err(|err| anyhow!(err))?;
        let factory_address = var(FACTORY_ADDRESS_ENV)
            .map(|raw| parse_address(FACTORY_ADDRESS_ENV, &raw))
            .transpose()
            .map_err(|err| anyhow!(err))?;
        let salt = match var(ACCOUNT_SALT_ENV) {
            Some(raw) => U256::from_dec_str(&raw)
                .map_err(|err| anyhow!("{ACCOUNT_SALT_ENV} must be a decimal integer: {err}"))?,
            None => U256::zero(),
        };
        let secret = var(SECRET_ENV).with_context(|| format!("{SECRET_ENV} must be set"))?;

        Ok(Self {
            account: SmartAccountConfig {
                kind,
                rpc_url,
                bundler_url,
                entry_point,
                factory_address,
                salt,
            },
            secret,
        })
    }
}

/// Derive the owner key for `email` and resolve its smart account.
pub async fn embedded_wallet(config: &EmbeddedWalletConfig, email: &str) -> Result<SmartAccount> {
    let owner = OwnerKey::from_email(email, &config.secret)?;
    let provider = BundlerAccountProvider::from_config(&config.account)?;
    let account = provider.derive_or_create_wallet(&owner).await?;
    info!(
        "Embedded wallet {:?} (owner {:?}) via {}",
        account.address,
        owner.address(),
        provider.kind()
    );
    Ok(account)
}
