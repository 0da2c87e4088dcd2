//! Account derivation parameters.

use ethers_core::types::{Address, U256};

use crate::{salt::Salt, WalletKind};

/// Inputs to the factory's `getAddress` / `createAccount` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDerivationParams {
    pub owner: Address,
    pub kind: WalletKind,
    /// Exchange wallet mirrored by a shadow account.
    pub linked_wallet: Option<Address>,
    pub email_commitment: Option<[u8; 32]>,
    /// Overrides the verifier configured for the deployment.
    pub verifier_override: Option<Address>,
    pub salt: Salt,
}

impl AccountDerivationParams {
    pub fn native(owner: Address, email_commitment: [u8; 32], salt: Salt) -> Self {
        Self {
            owner,
            kind: WalletKind::Native,
            linked_wallet: None,
            email_commitment: Some(email_commitment),
            verifier_override: None,
            salt,
        }
    }

    pub fn binance_shadow(owner: Address, linked_wallet: Address, salt: Salt) -> Self {
        Self {
            owner,
            kind: WalletKind::BinanceShadow,
            linked_wallet: Some(linked_wallet),
            email_commitment: None,
            verifier_override: None,
            salt,
        }
    }

    /// Fill every optional slot, zero where nothing applies.
    ///
    /// Verifier precedence: override, then the deployment default, then zero.
    pub fn resolve(&self, default_verifier: Option<Address>) -> ResolvedDerivation {
        ResolvedDerivation {
            owner: self.owner,
            kind: self.kind.as_u8(),
            linked_wallet: self.linked_wallet.unwrap_or_else(Address::zero),
            email_commitment: self.email_commitment.unwrap_or([0u8; 32]),
            verifier: self
                .verifier_override
                .or(default_verifier)
                .unwrap_or_else(Address::zero),
            salt: self.salt.value(),
        }
    }
}

/// The exact tuple sent to the factory. Both the read-only and the
/// state-changing call must receive the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedDerivation {
    pub owner: Address,
    pub kind: u8,
    pub linked_wallet: Address,
    pub email_commitment: [u8; 32],
    pub verifier: Address,
    pub salt: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    #[test]
    fn native_params_zero_the_linked_wallet() {
        let params = AccountDerivationParams::native(addr(1), [7u8; 32], Salt::parse("9").unwrap());
        let resolved = params.resolve(None);
        assert_eq!(resolved.kind, 1);
        assert_eq!(resolved.linked_wallet, Address::zero());
        assert_eq!(resolved.email_commitment, [7u8; 32]);
        assert_eq!(resolved.verifier, Address::zero());
        assert_eq!(resolved.salt, U256::from(9u64));
    }

    #[test]
    fn shadow_params_zero_the_commitment() {
        let params =
            AccountDerivationParams::binance_shadow(addr(1), addr(2), Salt::parse("5").unwrap());
        let resolved = params.resolve(Some(addr(3)));
        assert_eq!(resolved.kind, 0);
        assert_eq!(resolved.linked_wallet, addr(2));
        assert_eq!(resolved.email_commitment, [0u8; 32]);
        assert_eq!(resolved.verifier, addr(3));
    }

    #[test]
    fn verifier_override_wins_over_default() {
        let mut params =
            AccountDerivationParams::native(addr(1), [1u8; 32], Salt::parse("1").unwrap());
        params.verifier_override = Some(addr(9));
        assert_eq!(params.resolve(Some(addr(3))).verifier, addr(9));
    }

    #[test]
    fn resolution_is_stable_across_calls() {
        let params = AccountDerivationParams::native(addr(4), [2u8; 32], Salt::parse("77").unwrap());
        assert_eq!(params.resolve(Some(addr(5))), params.resolve(Some(addr(5))));
    }
}
