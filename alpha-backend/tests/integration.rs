//! Integration tests for the onboarding HTTP service.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use alpha_backend::{
    app_router, AppState, ExchangeClient, ExchangeError, ProfileStore, SessionRegistry,
    TokenIssuer, WalletSummary,
};
use alpha_backend::exchange::Balance;
use alpha_chain::{AccountFactory, AccountService, ChainError, ProofVerifier};
use alpha_common::{ResolvedDerivation, SaltPolicy};
use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::Utc;
use ethers::{types::Address, utils::keccak256};
use serde_json::{json, Value};

const OWNER: &str = "0x00000000000000000000000000000000000000ab";
const BINANCE_WALLET: &str = "0x00000000000000000000000000000000000000b1";

/// CREATE2-style factory: the address is a hash of the full tuple.
struct HashFactory {
    can_sign: bool,
    creates: AtomicUsize,
}

impl HashFactory {
    fn new(can_sign: bool) -> Arc<Self> {
        Arc::new(Self {
            can_sign,
            creates: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AccountFactory for HashFactory {
    fn can_sign(&self) -> bool {
        self.can_sign
    }

    async fn get_address(&self, tuple: &ResolvedDerivation) -> Result<Address, ChainError> {
        let mut salt = [0u8; 32];
        tuple.salt.to_big_endian(&mut salt);
        let mut preimage = Vec::new();
        preimage.extend_from_slice(tuple.owner.as_bytes());
        preimage.push(tuple.kind);
        preimage.extend_from_slice(tuple.linked_wallet.as_bytes());
        preimage.extend_from_slice(&tuple.email_commitment);
        preimage.extend_from_slice(tuple.verifier.as_bytes());
        preimage.extend_from_slice(&salt);
        Ok(Address::from_slice(&keccak256(preimage)[12..]))
    }

    async fn create_account(&self, _tuple: &ResolvedDerivation) -> Result<String, ChainError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(format!("0x{}", "ab".repeat(32)))
    }
}

struct StaticExchange;

#[async_trait]
impl ExchangeClient for StaticExchange {
    async fn fetch_wallet_summary(
        &self,
        api_key: &str,
        _api_secret: &str,
    ) -> Result<WalletSummary, ExchangeError> {
        if api_key != "good-key" {
            return Err(ExchangeError::Status {
                status: 401,
                body: "Invalid API-key".into(),
            });
        }
        Ok(WalletSummary {
            balances: vec![Balance {
                asset: "BNB".into(),
                available: 1.5,
                locked: 0.25,
            }],
            fetched_at: Utc::now(),
        })
    }
}

fn state_with(accounts: AccountService, salt_policy: SaltPolicy) -> AppState {
    AppState::with_components(
        SessionRegistry::in_memory(None, salt_policy),
        Arc::new(ProofVerifier::accept_all()),
        accounts,
        ProfileStore::in_memory(),
        TokenIssuer::new("integration-secret", alpha_backend::token::DEFAULT_TOKEN_TTL),
        Arc::new(StaticExchange),
    )
}

fn create_server() -> TestServer {
    let accounts = AccountService::new(Some(HashFactory::new(true)), None);
    TestServer::new(app_router(state_with(accounts, SaltPolicy::TimestampFallback)))
        .expect("should create test server")
}

fn verify_body(session_id: &str) -> Value {
    json!({
        "sessionId": session_id,
        "proof": "0x1234",
        "nullifier": format!("0x{}", "11".repeat(32)),
        "userOpHash": format!("0x{}", "22".repeat(32)),
    })
}

async fn init_session(server: &TestServer, email: &str) -> Value {
    let response = server
        .post("/auth/zk-email/init")
        .json(&json!({ "email": email, "ownerAddress": OWNER }))
        .await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_server();
    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "Alpha Builder backend is running");
}

#[tokio::test]
async fn test_zk_email_onboarding_flow() {
    let server = create_server();

    let init = init_session(&server, "alice@example.com").await;
    let session_id = init["sessionId"].as_str().unwrap();
    assert_eq!(session_id.len(), 36);
    let salt = init["salt"].as_str().unwrap();
    assert!(!salt.is_empty() && salt.chars().all(|c| c.is_ascii_digit()));
    let commitment = init["emailCommitment"].as_str().unwrap();
    assert!(commitment.starts_with("0x") && commitment.len() == 66);

    let response = server
        .post("/auth/zk-email/verify")
        .json(&verify_body(session_id))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();

    let wallet = body["aaWalletAddress"].as_str().unwrap();
    assert!(wallet.starts_with("0x") && wallet.len() == 42);
    assert_eq!(body["emailCommitment"], init["emailCommitment"]);
    assert_eq!(body["token"].as_str().unwrap().split('.').count(), 3);
    assert!(!body["userId"].as_str().unwrap().is_empty());

    // The session is gone once redeemed.
    let response = server
        .post("/auth/zk-email/verify")
        .json(&verify_body(session_id))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "Session not found or expired");
    assert_eq!(body["error_code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn test_current_user_roundtrip() {
    let server = create_server();
    let init = init_session(&server, "bob@example.com").await;
    let verified: Value = server
        .post("/auth/zk-email/verify")
        .json(&verify_body(init["sessionId"].as_str().unwrap()))
        .await
        .json();
    let token = verified["token"].as_str().unwrap();

    let response = server
        .get("/users/me")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        )
        .await;
    response.assert_status_ok();
    let profile: Value = response.json();
    assert_eq!(profile["id"], verified["userId"]);
    assert_eq!(profile["type"], "NATIVE");
    assert_eq!(profile["aaWalletAddress"], verified["aaWalletAddress"]);
    assert_eq!(profile["emailCommitment"], init["emailCommitment"]);
    assert_eq!(profile["salt"], init["salt"]);
}

#[tokio::test]
async fn test_current_user_requires_token() {
    let server = create_server();

    let response = server.get("/users/me").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .get("/users/me")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer a.b.c"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let server = create_server();
    let response = server
        .post("/auth/zk-email/verify")
        .json(&verify_body("6f1c7a44-3c5e-4f43-9a53-7d1f2b0e9c11"))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_binance_onboarding() {
    let server = create_server();
    let response = server
        .post("/auth/binance/onboard")
        .json(&json!({
            "apiKey": "good-key",
            "apiSecret": "secret",
            "binanceWalletAddress": BINANCE_WALLET,
            "ownerAddress": OWNER,
            "salt": "42",
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["binanceWalletAddress"], BINANCE_WALLET);
    assert_eq!(body["balances"][0]["asset"], "BNB");
    assert_eq!(body["balances"][0]["available"], 1.5);
    assert_eq!(body["token"].as_str().unwrap().split('.').count(), 3);

    // Same owner, wallet and salt derive the same account, which is taken.
    let response = server
        .post("/auth/binance/onboard")
        .json(&json!({
            "apiKey": "good-key",
            "apiSecret": "secret",
            "binanceWalletAddress": BINANCE_WALLET,
            "ownerAddress": OWNER,
            "salt": "42",
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "WALLET_ALREADY_REGISTERED");
}

#[tokio::test]
async fn test_binance_bad_credentials() {
    let server = create_server();
    let response = server
        .post("/auth/binance/onboard")
        .json(&json!({
            "apiKey": "bad-key",
            "apiSecret": "secret",
            "binanceWalletAddress": BINANCE_WALLET,
            "ownerAddress": OWNER,
        }))
        .await;
    response.assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_invalid_input() {
    let server = create_server();

    let response = server
        .post("/auth/zk-email/init")
        .json(&json!({ "email": "alice@example.com", "ownerAddress": "0x1234" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "INVALID_INPUT");

    let response = server
        .post("/auth/zk-email/init")
        .json(&json!({ "ownerAddress": OWNER }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/auth/binance/onboard")
        .json(&json!({
            "apiKey": "",
            "apiSecret": "secret",
            "binanceWalletAddress": BINANCE_WALLET,
            "ownerAddress": OWNER,
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_explicit_salt_policy() {
    let accounts = AccountService::new(Some(HashFactory::new(true)), None);
    let server = TestServer::new(app_router(state_with(accounts, SaltPolicy::Explicit)))
        .expect("should create test server");

    let response = server
        .post("/auth/zk-email/init")
        .json(&json!({ "email": "carol@example.com", "ownerAddress": OWNER }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "SALT_REQUIRED");

    let response = server
        .post("/auth/zk-email/init")
        .json(&json!({ "email": "carol@example.com", "ownerAddress": OWNER, "salt": "7" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["salt"], "7");
}

#[tokio::test]
async fn test_missing_factory_keeps_session() {
    let server = TestServer::new(app_router(state_with(
        AccountService::new(None, None),
        SaltPolicy::TimestampFallback,
    )))
    .expect("should create test server");

    let init = init_session(&server, "dave@example.com").await;
    let session_id = init["sessionId"].as_str().unwrap();

    for _ in 0..2 {
        let response = server
            .post("/auth/zk-email/verify")
            .json(&verify_body(session_id))
            .await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["error_code"], "CHAIN_NOT_CONFIGURED");
    }
}

#[tokio::test]
async fn test_read_only_factory_predicts() {
    let factory = HashFactory::new(false);
    let accounts = AccountService::new(Some(factory.clone()), None);
    let server = TestServer::new(app_router(state_with(accounts, SaltPolicy::TimestampFallback)))
        .expect("should create test server");

    let init = init_session(&server, "erin@example.com").await;
    let response = server
        .post("/auth/zk-email/verify")
        .json(&verify_body(init["sessionId"].as_str().unwrap()))
        .await;
    response.assert_status_ok();
    assert_eq!(factory.creates.load(Ordering::SeqCst), 0);
}
