//! alpha-chain
//!
//! Ethereum collaborators for Alpha Builder onboarding.
//!
//! # Features
//! - Deterministic smart-account address prediction through the factory's
//!   read-only `getAddress`
//! - Account creation through `createAccount`, falling back to prediction
//! - Delegated zk-email proof verification
//! - Configurable smart-account providers (ZeroDev, Alchemy, Stackup, ERC-4337)

use std::sync::Arc;

use ethers::{
    prelude::{Http, LocalWallet, Provider},
    signers::Signer,
    types::Address,
};
use thiserror::Error;

pub mod accounts;
pub mod contracts;
pub mod factory;
pub mod provider;
pub mod verifier;

pub use accounts::{AccountOutcome, AccountService};
pub use factory::{AccountFactory, EthersAccountFactory};
pub use provider::{
    BundlerAccountProvider, OwnerKey, SmartAccount, SmartAccountClient, SmartAccountConfig,
    SmartAccountProvider, SmartAccountProviderKind, ENTRY_POINT_V06,
};
pub use verifier::{EmailProofVerifier, ProofVerifier, VerifierMode};

/// Aggregated error type for chain interactions.
#[derive(Debug, Error)]
pub enum ChainError {
    /// No factory address configured; fatal for both prediction and creation.
    #[error("EMAIL_AA_FACTORY_ADDRESS not configured")]
    FactoryNotConfigured,

    /// No operator key configured; creation is skipped.
    #[error("ETHEREUM_OPERATOR_KEY not configured")]
    SignerNotConfigured,

    /// Node unreachable or JSON-RPC failure.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// Contract call or transaction submission failed.
    #[error("contract error: {0}")]
    Contract(String),

    /// Transaction left the mempool without a receipt.
    #[error("transaction {0} dropped before inclusion")]
    TransactionDropped(String),

    /// Transaction was mined with a failed status.
    #[error("transaction {0} reverted")]
    TransactionReverted(String),

    /// Invalid key, address or URL in the configuration.
    #[error("invalid chain configuration: {0}")]
    InvalidConfig(String),
}

impl ChainError {
    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ChainError::FactoryNotConfigured | ChainError::SignerNotConfigured => {
                "CHAIN_NOT_CONFIGURED"
            }
            ChainError::InvalidConfig(_) => "CHAIN_CONFIG_INVALID",
            ChainError::Rpc(_)
            | ChainError::Contract(_)
            | ChainError::TransactionDropped(_)
            | ChainError::TransactionReverted(_) => "CHAIN_ERROR",
        }
    }

    /// Configuration problems, as opposed to failures of the node or contract.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ChainError::FactoryNotConfigured
                | ChainError::SignerNotConfigured
                | ChainError::InvalidConfig(_)
        )
    }
}

/// Connection settings for the chain collaborators.
#[derive(Clone, Debug, Default)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Operator key; without it write operations are disabled.
    pub operator_key: Option<String>,
    pub factory_address: Option<Address>,
    pub verifier_address: Option<Address>,
}

/// Read-only HTTP provider for `rpc_url`.
pub fn http_provider(rpc_url: &str) -> Result<Provider<Http>, ChainError> {
    Provider::<Http>::try_from(rpc_url)
        .map_err(|err| ChainError::InvalidConfig(format!("rpc url {rpc_url}: {err}")))
}

/// Parse an operator key into a wallet bound to `chain_id`.
pub fn operator_wallet(key: &str, chain_id: u64) -> Result<LocalWallet, ChainError> {
    let wallet = key
        .trim()
        .trim_start_matches("0x")
        .parse::<LocalWallet>()
        .map_err(|err| ChainError::InvalidConfig(format!("operator key: {err}")))?;
    Ok(wallet.with_chain_id(chain_id))
}

/// Build the account service and proof verifier from `config`.
///
/// Nothing here touches the network; a node that is down only shows up on
/// the first call.
pub fn connect(config: &ChainConfig) -> Result<(AccountService, ProofVerifier), ChainError> {
    let provider = http_provider(&config.rpc_url)?;

    let factory = match config.factory_address {
        Some(address) => {
            let signer = config
                .operator_key
                .as_deref()
                .map(|key| operator_wallet(key, config.chain_id))
                .transpose()?;
            if signer.is_none() {
                tracing::warn!("ETHEREUM_OPERATOR_KEY not configured; write operations disabled");
            }
            let factory = EthersAccountFactory::new(provider.clone(), address, signer);
            Some(Arc::new(factory) as Arc<dyn AccountFactory>)
        }
        None => {
            tracing::warn!("EMAIL_AA_FACTORY_ADDRESS not configured; onboarding will fail");
            None
        }
    };

    let verifier = match config.verifier_address {
        Some(address) => ProofVerifier::contract(provider, address),
        None => ProofVerifier::accept_all(),
    };

    Ok((
        AccountService::new(factory, config.verifier_address),
        verifier,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hardhat's first default account.
    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn operator_wallet_accepts_prefixed_keys() {
        let wallet = operator_wallet(&format!("0x{TEST_KEY}"), 31337).unwrap();
        assert_eq!(wallet.chain_id(), 31337);
        assert_eq!(
            format!("{:?}", wallet.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn operator_wallet_rejects_garbage() {
        let err = operator_wallet("not-a-key", 1).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.error_code(), "CHAIN_CONFIG_INVALID");
    }

    #[test]
    fn connect_without_verifier_accepts_all() {
        let config = ChainConfig {
            rpc_url: "http://127.0.0.1:8545".into(),
            chain_id: 31337,
            ..Default::default()
        };
        let (accounts, verifier) = connect(&config).unwrap();
        assert!(!accounts.factory_configured());
        assert_eq!(verifier.mode(), VerifierMode::AcceptAll);
    }

    #[test]
    fn connect_rejects_bad_rpc_url() {
        let config = ChainConfig {
            rpc_url: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(connect(&config), Err(ChainError::InvalidConfig(_))));
    }
}
