//! alpha-common
//!
//! Domain types shared by the Alpha Builder backend, chain collaborators and
//! client. This crate holds the pieces every flow agrees on: wallet kinds,
//! derivation parameters, salt resolution and the email commitment.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod commitment;
pub mod params;
pub mod salt;
pub mod validate;

pub use commitment::{email_commitment, format_bytes32};
pub use params::{AccountDerivationParams, ResolvedDerivation};
pub use salt::{Salt, SaltPolicy};

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommonError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("salt is required when the explicit salt policy is active")]
    SaltRequired,

    #[error("unknown salt policy '{0}'")]
    UnknownSaltPolicy(String),

    #[error("unknown user type '{0}'")]
    UnknownUserType(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Discriminant passed to the account factory as `uint8 kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WalletKind {
    /// Shadow account mirroring a linked exchange wallet.
    BinanceShadow = 0,
    /// Account owned through a verified email commitment.
    Native = 1,
}

impl WalletKind {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for WalletKind {
    type Error = CommonError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::BinanceShadow),
            1 => Ok(Self::Native),
            other => Err(CommonError::InvalidInput(format!(
                "unknown wallet kind {other}"
            ))),
        }
    }
}

/// Profile variant recorded for an onboarded user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    BinanceShadow,
    Native,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::BinanceShadow => "BINANCE_SHADOW",
            UserType::Native => "NATIVE",
        }
    }

    /// Factory wallet kind used when onboarding this user type.
    pub fn wallet_kind(&self) -> WalletKind {
        match self {
            UserType::BinanceShadow => WalletKind::BinanceShadow,
            UserType::Native => WalletKind::Native,
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserType {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BINANCE_SHADOW" => Ok(Self::BinanceShadow),
            "NATIVE" => Ok(Self::Native),
            other => Err(CommonError::UnknownUserType(other.to_string())),
        }
    }
}
