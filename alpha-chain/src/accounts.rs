//! Account prediction and creation.
//!
//! One onboarding attempt walks a two-state machine:
//!
//! 1. **create** – if the factory can sign, submit `createAccount` with the
//!    resolved tuple, wait for inclusion, then read the address back through
//!    `getAddress` with the same tuple.
//! 2. **predict** – on any creation failure, call `getAddress` only.
//!
//! A missing factory aborts before either state.

use std::sync::Arc;

use alpha_common::{AccountDerivationParams, ResolvedDerivation};
use ethers::types::Address;
use serde::Serialize;
use tracing::{info, warn};

use crate::{factory::AccountFactory, ChainError};

/// Result of [`AccountService::create_or_predict`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountOutcome {
    pub address: Address,
    /// `true` when `createAccount` was mined in this attempt.
    pub created: bool,
    pub tx_hash: Option<String>,
}

impl AccountOutcome {
    fn created(address: Address, tx_hash: String) -> Self {
        Self {
            address,
            created: true,
            tx_hash: Some(tx_hash),
        }
    }

    fn predicted(address: Address) -> Self {
        Self {
            address,
            created: false,
            tx_hash: None,
        }
    }
}

#[derive(Clone)]
pub struct AccountService {
    factory: Option<Arc<dyn AccountFactory>>,
    default_verifier: Option<Address>,
}

impl AccountService {
    pub fn new(factory: Option<Arc<dyn AccountFactory>>, default_verifier: Option<Address>) -> Self {
        Self {
            factory,
            default_verifier,
        }
    }

    pub fn factory_configured(&self) -> bool {
        self.factory.is_some()
    }

    pub fn can_create(&self) -> bool {
        self.factory.as_ref().map(|f| f.can_sign()).unwrap_or(false)
    }

    /// The tuple both paths are called with for `params`.
    pub fn resolve(&self, params: &AccountDerivationParams) -> ResolvedDerivation {
        params.resolve(self.default_verifier)
    }

    /// Read-only address prediction.
    pub async fn predict(&self, params: &AccountDerivationParams) -> Result<Address, ChainError> {
        let factory = self.factory()?;
        factory.get_address(&self.resolve(params)).await
    }

    /// Materialize the account on chain. Fails with `SignerNotConfigured`
    /// without sending anything when no operator key is present.
    pub async fn create_account(
        &self,
        params: &AccountDerivationParams,
    ) -> Result<AccountOutcome, ChainError> {
        let factory = self.factory()?;
        let tuple = self.resolve(params);
        Self::create_with(factory.as_ref(), &tuple).await
    }

    /// Try to create the account, else predict its address.
    pub async fn create_or_predict(
        &self,
        params: &AccountDerivationParams,
    ) -> Result<AccountOutcome, ChainError> {
        let factory = self.factory()?;
        let tuple = self.resolve(params);

        match Self::create_with(factory.as_ref(), &tuple).await {
            Ok(outcome) => {
                info!("Created account {:?}", outcome.address);
                Ok(outcome)
            }
            Err(err) => {
                warn!(
                    "createAccount failed, falling back to deterministic address: {}",
                    err
                );
                let address = factory.get_address(&tuple).await?;
                Ok(AccountOutcome::predicted(address))
            }
        }
    }

    async fn create_with(
        factory: &dyn AccountFactory,
        tuple: &ResolvedDerivation,
    ) -> Result<AccountOutcome, ChainError> {
        if !factory.can_sign() {
            return Err(ChainError::SignerNotConfigured);
        }
        let tx_hash = factory.create_account(tuple).await?;
        let address = factory.get_address(tuple).await?;
        Ok(AccountOutcome::created(address, tx_hash))
    }

    fn factory(&self) -> Result<&Arc<dyn AccountFactory>, ChainError> {
        self.factory.as_ref().ok_or(ChainError::FactoryNotConfigured)
    }
}
