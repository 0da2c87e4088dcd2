//! Input parsing for request fields.

use ethers_core::{types::Address, utils::to_checksum};

use crate::CommonError;

/// Parse a `0x`-prefixed 20-byte hex address.
pub fn parse_address(field: &str, raw: &str) -> Result<Address, CommonError> {
    let bytes = parse_prefixed_hex(field, raw)?;
    if bytes.len() != 20 {
        return Err(CommonError::InvalidInput(format!(
            "{field} must be a 20-byte address"
        )));
    }
    Ok(Address::from_slice(&bytes))
}

/// Parse a `0x`-prefixed 32-byte hex word.
pub fn parse_bytes32(field: &str, raw: &str) -> Result<[u8; 32], CommonError> {
    let bytes = parse_prefixed_hex(field, raw)?;
    if bytes.len() != 32 {
        return Err(CommonError::InvalidInput(format!(
            "{field} must be 32 bytes (66 hex characters)"
        )));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Parse arbitrary non-empty `0x`-prefixed hex.
pub fn parse_prefixed_hex(field: &str, raw: &str) -> Result<Vec<u8>, CommonError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| CommonError::InvalidInput(format!("{field} must be 0x-prefixed hex")))?;
    if digits.is_empty() {
        return Err(CommonError::InvalidInput(format!("{field} must not be empty")));
    }
    hex::decode(digits)
        .map_err(|err| CommonError::InvalidInput(format!("{field} is not valid hex: {err}")))
}

/// Loose `local@domain.tld` check; deliverability is the proof's job.
pub fn validate_email(raw: &str) -> Result<(), CommonError> {
    let invalid = || CommonError::InvalidInput("email must be a valid email address".into());
    if raw.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = raw.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && tld.len() >= 2 => Ok(()),
        _ => Err(invalid()),
    }
}

/// EIP-55 checksummed form, as returned by the factory bindings.
pub fn checksum(address: &Address) -> String {
    to_checksum(address, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_addresses() {
        let addr = parse_address("owner", "0x00000000000000000000000000000000000000aa").unwrap();
        assert_eq!(addr.as_bytes()[19], 0xaa);
        assert!(parse_address("owner", "00000000000000000000000000000000000000aa").is_err());
        assert!(parse_address("owner", "0x1234").is_err());
        assert!(parse_address("owner", "0xzz00000000000000000000000000000000000000").is_err());
    }

    #[test]
    fn parses_bytes32() {
        let word = format!("0x{}", "11".repeat(32));
        assert_eq!(parse_bytes32("nullifier", &word).unwrap(), [0x11; 32]);
        assert!(parse_bytes32("nullifier", "0x11").is_err());
    }

    #[test]
    fn email_check_is_loose_but_not_empty() {
        assert!(validate_email("a@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.io").is_ok());
        assert!(validate_email("a@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a b@example.com").is_err());
        assert!(validate_email("a@b@example.com").is_err());
    }

    #[test]
    fn checksum_round_trips() {
        let raw = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
        let addr = parse_address("a", raw).unwrap();
        assert_eq!(checksum(&addr), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }
}
