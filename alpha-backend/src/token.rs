//! Bearer tokens (HS256 JWT).

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use alpha_common::UserType;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("invalid token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token signing failed: {0}")]
    Signing(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(rename = "type")]
    pub user_type: UserType,
    #[serde(rename = "aaWalletAddress")]
    pub aa_wallet_address: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    secret: Arc<[u8]>,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(
        &self,
        subject: &str,
        user_type: UserType,
        wallet_address: &str,
    ) -> Result<String, TokenError> {
        self.issue_at(subject, user_type, wallet_address, unix_now())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        user_type: UserType,
        wallet_address: &str,
        now: u64,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.to_string(),
            user_type,
            aa_wallet_address: wallet_address.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        };
        let payload =
            serde_json::to_vec(&claims).map_err(|err| TokenError::Signing(err.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.mac(signing_input.as_bytes())?.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, unix_now())
    }

    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (header, payload, signature) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => return Err(TokenError::Malformed),
            };
        let signing_input = &token[..header.len() + 1 + payload.len()];

        let header_json = URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|_| TokenError::Malformed)?;
        let header_value: serde_json::Value =
            serde_json::from_slice(&header_json).map_err(|_| TokenError::Malformed)?;
        if header_value["alg"] != "HS256" {
            return Err(TokenError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        self.mac(signing_input.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, data: &[u8]) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| TokenError::Signing("hmac init failed".into()))?;
        mac.update(data);
        Ok(mac)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "0x00000000000000000000000000000000000000aA";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret", DEFAULT_TOKEN_TTL)
    }

    #[test]
    fn token_has_three_segments() {
        let token = issuer().issue("user-1", UserType::Native, WALLET).unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn verify_round_trips_claims() {
        let issuer = issuer();
        let token = issuer
            .issue_at("user-1", UserType::BinanceShadow, WALLET, 1_700_000_000)
            .unwrap();
        let claims = issuer.verify_at(&token, 1_700_000_100).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.user_type, UserType::BinanceShadow);
        assert_eq!(claims.aa_wallet_address, WALLET);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn payload_uses_wire_field_names() {
        let token = issuer()
            .issue_at("user-1", UserType::Native, WALLET, 10)
            .unwrap();
        let payload = token.split('.').nth(1).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        assert_eq!(json["type"], "NATIVE");
        assert_eq!(json["aaWalletAddress"], WALLET);
        assert_eq!(json["exp"], 3610);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let issuer = issuer();
        let token = issuer
            .issue_at("user-1", UserType::Native, WALLET, 1_000)
            .unwrap();
        assert!(matches!(
            issuer.verify_at(&token, 1_000 + 3600),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn huge_ttl_saturates_expiry() {
        let issuer = TokenIssuer::new("test-secret", Duration::from_secs(u64::MAX));
        let token = issuer
            .issue_at("user-1", UserType::Native, WALLET, 1_700_000_000)
            .unwrap();
        let claims = issuer.verify_at(&token, 1_700_000_001).unwrap();
        assert_eq!(claims.exp, u64::MAX);
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = issuer().issue("user-1", UserType::Native, WALLET).unwrap();
        let other = TokenIssuer::new("other-secret", DEFAULT_TOKEN_TTL);
        assert!(matches!(other.verify(&token), Err(TokenError::BadSignature)));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let issuer = issuer();
        let token = issuer.issue("user-1", UserType::Native, WALLET).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(
            r#"{"sub":"admin","type":"NATIVE","aaWalletAddress":"0x0","iat":0,"exp":99999999999}"#,
        );
        parts[1] = &forged;
        assert!(matches!(
            issuer.verify(&parts.join(".")),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(issuer().verify("abc"), Err(TokenError::Malformed)));
        assert!(matches!(issuer().verify("a.b.c.d"), Err(TokenError::Malformed)));
    }
}
