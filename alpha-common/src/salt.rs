//! Derivation salt handling.
//!
//! A salt travels as a decimal string on the wire and as a `uint256` on
//! chain. It is resolved exactly once per onboarding attempt so that the
//! prediction and creation paths see the same value.

use std::{
    fmt,
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use ethers_core::types::U256;
use serde::{Deserialize, Serialize};

use crate::CommonError;

/// What to do when a caller omits the salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SaltPolicy {
    /// Default the salt to the current time in milliseconds. Two attempts
    /// without a salt derive different addresses.
    #[default]
    TimestampFallback,
    /// Reject requests without a salt.
    Explicit,
}

impl SaltPolicy {
    /// Resolve an optional caller-supplied salt into a concrete value.
    pub fn resolve(&self, supplied: Option<&str>) -> Result<Salt, CommonError> {
        match supplied {
            Some(raw) => Salt::parse(raw),
            None => match self {
                SaltPolicy::TimestampFallback => Ok(Salt::from_timestamp_millis(now_millis())),
                SaltPolicy::Explicit => Err(CommonError::SaltRequired),
            },
        }
    }
}

impl FromStr for SaltPolicy {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "timestamp-fallback" | "timestamp" => Ok(SaltPolicy::TimestampFallback),
            "explicit" | "required" => Ok(SaltPolicy::Explicit),
            other => Err(CommonError::UnknownSaltPolicy(other.to_string())),
        }
    }
}

/// A resolved salt, kept in both its decimal and integer forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt {
    decimal: String,
    value: U256,
}

impl Salt {
    /// Parse a non-empty all-digit decimal string that fits in 256 bits.
    pub fn parse(raw: &str) -> Result<Self, CommonError> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CommonError::InvalidInput(
                "salt must be a numeric string".into(),
            ));
        }
        let value = U256::from_dec_str(raw)
            .map_err(|_| CommonError::InvalidInput("salt does not fit in uint256".into()))?;
        Ok(Self {
            decimal: raw.to_string(),
            value,
        })
    }

    pub fn from_timestamp_millis(millis: u128) -> Self {
        Self {
            decimal: millis.to_string(),
            value: U256::from(millis),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.decimal
    }

    pub fn value(&self) -> U256 {
        self.value
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.decimal)
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
