//! Embedded smart-account providers.
//!
//! An email maps to a deterministic owner key; a provider turns that key into
//! a counterfactual ERC-4337 account plus a handle on the provider's bundler.
//! Which provider is used is a configuration choice.

use std::{fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use ethers::{
    prelude::{Http, LocalWallet, Provider},
    signers::Signer,
    types::{Address, U256},
};
use sha3::{Digest, Keccak256};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::{contracts::SimpleAccountFactory, http_provider, ChainError};

/// ERC-4337 EntryPoint v0.6.
pub const ENTRY_POINT_V06: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";

/// eth-infinitism SimpleAccountFactory for EntryPoint v0.6.
pub const SIMPLE_ACCOUNT_FACTORY: &str = "0x9406Cc6185a346906296840746125a0E44976454";

const OWNER_KEY_DOMAIN: &[u8] = b"alpha-builder/embedded-owner/v1";

// ============================================================================
// Provider selection
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SmartAccountProviderKind {
    ZeroDev,
    Alchemy,
    Stackup,
    Erc4337,
}

impl SmartAccountProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZeroDev => "zerodev",
            Self::Alchemy => "alchemy",
            Self::Stackup => "stackup",
            Self::Erc4337 => "erc4337",
        }
    }

    /// Factory used when none is configured. ZeroDev and Alchemy ship their
    /// own account implementations, so they need an explicit address.
    pub fn default_factory(&self) -> Option<Address> {
        match self {
            Self::Stackup | Self::Erc4337 => SIMPLE_ACCOUNT_FACTORY.parse().ok(),
            Self::ZeroDev | Self::Alchemy => None,
        }
    }
}

impl fmt::Display for SmartAccountProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SmartAccountProviderKind {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zerodev" => Ok(Self::ZeroDev),
            "alchemy" => Ok(Self::Alchemy),
            "stackup" => Ok(Self::Stackup),
            "erc4337" | "erc-4337" => Ok(Self::Erc4337),
            other => Err(ChainError::InvalidConfig(format!(
                "unknown smart account provider '{other}'"
            ))),
        }
    }
}

// ============================================================================
// Owner key
// ============================================================================

/// secp256k1 key owning an embedded account.
#[derive(Clone)]
pub struct OwnerKey {
    wallet: LocalWallet,
}

impl OwnerKey {
    /// Same `(email, secret)` always yields the same key. Email case and
    /// surrounding whitespace are ignored.
    pub fn from_email(email: &str, app_secret: &str) -> Result<Self, ChainError> {
        let mut hasher = Keccak256::new();
        hasher.update(OWNER_KEY_DOMAIN);
        hasher.update(app_secret.as_bytes());
        hasher.update(email.trim().to_lowercase().as_bytes());
        let seed = hasher.finalize();

        let wallet = LocalWallet::from_bytes(seed.as_slice())
            .map_err(|err| ChainError::InvalidConfig(format!("owner key: {err}")))?;
        Ok(Self { wallet })
    }

    pub fn from_wallet(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }
}

impl fmt::Debug for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerKey")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Account client
// ============================================================================

/// Handle on a smart account and its bundler. The bundler connection is only
/// built on first use.
#[derive(Clone)]
pub struct SmartAccountClient {
    kind: SmartAccountProviderKind,
    account: Address,
    owner: OwnerKey,
    entry_point: Address,
    bundler_url: String,
    bundler: Arc<OnceCell<Provider<Http>>>,
}

impl SmartAccountClient {
    pub fn new(
        kind: SmartAccountProviderKind,
        account: Address,
        owner: OwnerKey,
        entry_point: Address,
        bundler_url: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            account,
            owner,
            entry_point,
            bundler_url: bundler_url.into(),
            bundler: Arc::new(OnceCell::new()),
        }
    }

    pub fn kind(&self) -> SmartAccountProviderKind {
        self.kind
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn owner(&self) -> &OwnerKey {
        &self.owner
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    pub fn bundler_url(&self) -> &str {
        &self.bundler_url
    }

    pub fn is_connected(&self) -> bool {
        self.bundler.initialized()
    }

    pub async fn bundler(&self) -> Result<&Provider<Http>, ChainError> {
        self.bundler
            .get_or_try_init(|| async {
                debug!("Connecting {} bundler at {}", self.kind, self.bundler_url);
                http_provider(&self.bundler_url)
            })
            .await
    }

    /// Entry points the bundler accepts user operations for.
    pub async fn supported_entry_points(&self) -> Result<Vec<Address>, ChainError> {
        let bundler = self.bundler().await?;
        bundler
            .request::<_, Vec<Address>>("eth_supportedEntryPoints", ())
            .await
            .map_err(|err| ChainError::Rpc(format!("eth_supportedEntryPoints: {err}")))
    }
}

impl fmt::Debug for SmartAccountClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartAccountClient")
            .field("kind", &self.kind)
            .field("account", &self.account)
            .field("entry_point", &self.entry_point)
            .field("bundler_url", &self.bundler_url)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct SmartAccount {
    pub address: Address,
    pub client: SmartAccountClient,
}

// ============================================================================
// Providers
// ============================================================================

#[async_trait]
pub trait SmartAccountProvider: Send + Sync {
    fn kind(&self) -> SmartAccountProviderKind;

    /// Resolve the counterfactual account for `owner`. Nothing is deployed;
    /// the account is created with the first user operation.
    async fn derive_or_create_wallet(&self, owner: &OwnerKey) -> Result<SmartAccount, ChainError>;
}

/// Settings for a [`BundlerAccountProvider`].
#[derive(Clone, Debug)]
pub struct SmartAccountConfig {
    pub kind: SmartAccountProviderKind,
    /// Node used for the factory's `getAddress`.
    pub rpc_url: String,
    pub bundler_url: String,
    pub entry_point: Option<Address>,
    pub factory_address: Option<Address>,
    pub salt: U256,
}

/// Provider for factories exposing `getAddress(owner, salt)`. Every
/// supported provider kind fits this shape; they differ in bundler endpoint
/// and default factory.
pub struct BundlerAccountProvider {
    kind: SmartAccountProviderKind,
    factory: SimpleAccountFactory<Provider<Http>>,
    entry_point: Address,
    bundler_url: String,
    salt: U256,
}

impl BundlerAccountProvider {
    pub fn from_config(config: &SmartAccountConfig) -> Result<Self, ChainError> {
        let factory_address = config
            .factory_address
            .or_else(|| config.kind.default_factory())
            .ok_or_else(|| {
                ChainError::InvalidConfig(format!(
                    "{} requires SMART_ACCOUNT_FACTORY_ADDRESS",
                    config.kind
                ))
            })?;
        let entry_point = match config.entry_point {
            Some(address) => address,
            None => ENTRY_POINT_V06
                .parse()
                .map_err(|err| ChainError::InvalidConfig(format!("entry point: {err}")))?,
        };
        if config.bundler_url.trim().is_empty() {
            return Err(ChainError::InvalidConfig(format!(
                "{} requires a bundler url",
                config.kind
            )));
        }

        let provider = http_provider(&config.rpc_url)?;
        Ok(Self {
            kind: config.kind,
            factory: SimpleAccountFactory::new(factory_address, Arc::new(provider)),
            entry_point,
            bundler_url: config.bundler_url.clone(),
            salt: config.salt,
        })
    }

    pub fn factory_address(&self) -> Address {
        self.factory.address()
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }
}

#[async_trait]
impl SmartAccountProvider for BundlerAccountProvider {
    fn kind(&self) -> SmartAccountProviderKind {
        self.kind
    }

    async fn derive_or_create_wallet(&self, owner: &OwnerKey) -> Result<SmartAccount, ChainError> {
        let address = self
            .factory
            .get_address(owner.address(), self.salt)
            .call()
            .await
            .map_err(|err| ChainError::Rpc(format!("getAddress failed: {err}")))?;
        info!(
            "{} account {:?} for owner {:?}",
            self.kind,
            address,
            owner.address()
        );

        let client = SmartAccountClient::new(
            self.kind,
            address,
            owner.clone(),
            self.entry_point,
            self.bundler_url.clone(),
        );
        Ok(SmartAccount { address, client })
    }
}
