//! zk-email proof verification.
//!
//! Verification itself is delegated: the proof bytes and public inputs are
//! forwarded to an on-chain verifier and its boolean answer is returned.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    prelude::{Http, Provider},
    types::{Address, Bytes},
};
use tracing::{debug, warn};

use crate::{contracts::ZkEmailVerifier, ChainError};

#[async_trait]
pub trait EmailProofVerifier: Send + Sync {
    /// `Ok(false)` means the verifier rejected the proof; a failed call is an
    /// `Err`, never a rejection.
    async fn verify(
        &self,
        proof: &[u8],
        email_commitment: [u8; 32],
        nullifier: [u8; 32],
        user_op_hash: [u8; 32],
    ) -> Result<bool, ChainError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifierMode {
    Contract,
    AcceptAll,
}

#[derive(Clone)]
enum Backend {
    Contract(Arc<ZkEmailVerifier<Provider<Http>>>),
    AcceptAll,
}

/// The deployment's verifier: either a contract or the explicit accept-all
/// bypass.
#[derive(Clone)]
pub struct ProofVerifier {
    backend: Backend,
}

impl ProofVerifier {
    pub fn contract(provider: Provider<Http>, address: Address) -> Self {
        let contract = ZkEmailVerifier::new(address, Arc::new(provider));
        Self {
            backend: Backend::Contract(Arc::new(contract)),
        }
    }

    /// Accepts every proof. Only for local development.
    pub fn accept_all() -> Self {
        Self {
            backend: Backend::AcceptAll,
        }
    }

    pub fn mode(&self) -> VerifierMode {
        match self.backend {
            Backend::Contract(_) => VerifierMode::Contract,
            Backend::AcceptAll => VerifierMode::AcceptAll,
        }
    }

    pub fn address(&self) -> Option<Address> {
        match &self.backend {
            Backend::Contract(contract) => Some(contract.address()),
            Backend::AcceptAll => None,
        }
    }
}

#[async_trait]
impl EmailProofVerifier for ProofVerifier {
    async fn verify(
        &self,
        proof: &[u8],
        email_commitment: [u8; 32],
        nullifier: [u8; 32],
        user_op_hash: [u8; 32],
    ) -> Result<bool, ChainError> {
        match &self.backend {
            Backend::AcceptAll => {
                warn!(
                    "zk-email verifier not configured; accepting proof for commitment 0x{} unverified",
                    hex::encode(email_commitment)
                );
                Ok(true)
            }
            Backend::Contract(contract) => {
                debug!(
                    "verifyProof at {:?} ({} proof bytes)",
                    contract.address(),
                    proof.len()
                );
                contract
                    .verify_proof(
                        Bytes::from(proof.to_vec()),
                        email_commitment,
                        nullifier,
                        user_op_hash,
                    )
                    .call()
                    .await
                    .map_err(|err| ChainError::Rpc(format!("verifyProof failed: {err}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accept_all_accepts_arbitrary_input() {
        let verifier = ProofVerifier::accept_all();
        assert_eq!(verifier.mode(), VerifierMode::AcceptAll);
        assert!(verifier.address().is_none());
        assert!(verifier
            .verify(&[0xde, 0xad], [1; 32], [2; 32], [3; 32])
            .await
            .unwrap());
        assert!(verifier.verify(&[], [0; 32], [0; 32], [0; 32]).await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_verifier_is_an_error_not_a_rejection() {
        let provider = crate::http_provider("http://127.0.0.1:9").unwrap();
        let verifier = ProofVerifier::contract(provider, Address::repeat_byte(0x22));
        assert_eq!(verifier.mode(), VerifierMode::Contract);
        assert_eq!(verifier.address(), Some(Address::repeat_byte(0x22)));

        let result = verifier.verify(&[1, 2, 3], [1; 32], [2; 32], [3; 32]).await;
        assert!(matches!(result, Err(ChainError::Rpc(_))));
    }
}
