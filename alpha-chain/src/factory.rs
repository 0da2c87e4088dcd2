//! Email AA factory client.

use std::sync::Arc;

use alpha_common::ResolvedDerivation;
use async_trait::async_trait;
use ethers::{
    prelude::{Http, LocalWallet, Provider, SignerMiddleware},
    types::{Address, U64},
};
use tracing::{debug, info};

use crate::{contracts::EmailAaFactory, ChainError};

/// Factory contract exposing the `getAddress` / `createAccount` pair.
#[async_trait]
pub trait AccountFactory: Send + Sync {
    /// Whether `create_account` can submit a transaction at all.
    fn can_sign(&self) -> bool;

    /// Read-only address derivation.
    async fn get_address(&self, tuple: &ResolvedDerivation) -> Result<Address, ChainError>;

    /// Submit `createAccount` and wait for inclusion. Returns the tx hash.
    async fn create_account(&self, tuple: &ResolvedDerivation) -> Result<String, ChainError>;
}

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// [`AccountFactory`] backed by ethers bindings.
pub struct EthersAccountFactory {
    address: Address,
    reader: EmailAaFactory<Provider<Http>>,
    writer: Option<EmailAaFactory<SignerClient>>,
}

impl EthersAccountFactory {
    pub fn new(provider: Provider<Http>, address: Address, signer: Option<LocalWallet>) -> Self {
        let writer = signer.map(|wallet| {
            let client = SignerMiddleware::new(provider.clone(), wallet);
            EmailAaFactory::new(address, Arc::new(client))
        });
        Self {
            address,
            reader: EmailAaFactory::new(address, Arc::new(provider)),
            writer,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

#[async_trait]
impl AccountFactory for EthersAccountFactory {
    fn can_sign(&self) -> bool {
        self.writer.is_some()
    }

    async fn get_address(&self, tuple: &ResolvedDerivation) -> Result<Address, ChainError> {
        self.reader
            .get_address(
                tuple.owner,
                tuple.kind,
                tuple.linked_wallet,
                tuple.email_commitment,
                tuple.verifier,
                tuple.salt,
            )
            .call()
            .await
            .map_err(|err| ChainError::Rpc(format!("getAddress failed: {err}")))
    }

    async fn create_account(&self, tuple: &ResolvedDerivation) -> Result<String, ChainError> {
        let writer = self.writer.as_ref().ok_or(ChainError::SignerNotConfigured)?;
        let call = writer.create_account(
            tuple.owner,
            tuple.kind,
            tuple.linked_wallet,
            tuple.email_commitment,
            tuple.verifier,
            tuple.salt,
        );

        debug!("Sending createAccount to factory at {:?}", self.address);
        let pending = call
            .send()
            .await
            .map_err(|err| ChainError::Contract(format!("createAccount failed: {err}")))?;
        let tx_hash = format!("{:?}", pending.tx_hash());
        info!("createAccount submitted: {}", tx_hash);

        let receipt = pending
            .await
            .map_err(|err| ChainError::Rpc(err.to_string()))?
            .ok_or_else(|| ChainError::TransactionDropped(tx_hash.clone()))?;

        if receipt.status == Some(U64::zero()) {
            return Err(ChainError::TransactionReverted(tx_hash));
        }
        Ok(tx_hash)
    }
}
