//! HTTP handlers and wire types.

use alpha_common::{
    format_bytes32,
    validate::{checksum, parse_address, parse_bytes32, parse_prefixed_hex, validate_email},
    AccountDerivationParams, UserType,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::ApiError,
    exchange::Balance,
    profiles::{NewProfile, UserProfile},
    session::PendingSession,
    AppState,
};

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InitiateZkEmailRequest {
    pub email: String,
    pub owner_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateZkEmailResponse {
    pub session_id: String,
    pub email_commitment: String,
    pub salt: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerifyZkEmailRequest {
    pub session_id: String,
    pub proof: String,
    pub nullifier: String,
    pub user_op_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyZkEmailResponse {
    pub aa_wallet_address: String,
    pub email_commitment: String,
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BinanceOnboardRequest {
    pub api_key: String,
    pub api_secret: String,
    pub binance_wallet_address: String,
    pub owner_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceOnboardResponse {
    pub aa_wallet_address: String,
    pub binance_wallet_address: String,
    pub balances: Vec<Balance>,
    pub token: String,
    pub user_id: String,
}

fn rejected(err: JsonRejection) -> ApiError {
    ApiError::invalid_input(err.body_text())
}

// ============================================================================
// Handlers
// ============================================================================

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        message: "Alpha Builder backend is running".into(),
    })
}

pub(crate) async fn zk_email_init(
    State(state): State<AppState>,
    payload: Result<Json<InitiateZkEmailRequest>, JsonRejection>,
) -> Result<Json<InitiateZkEmailResponse>, ApiError> {
    let Json(req) = payload.map_err(rejected)?;
    validate_email(&req.email)?;
    let owner = parse_address("ownerAddress", &req.owner_address)?;

    let ticket = state
        .sessions()
        .initiate(&req.email, owner, req.salt.as_deref())?;

    Ok(Json(InitiateZkEmailResponse {
        session_id: ticket.session_id.to_string(),
        email_commitment: format_bytes32(&ticket.email_commitment),
        salt: ticket.salt.as_str().to_string(),
    }))
}

pub(crate) async fn zk_email_verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyZkEmailRequest>, JsonRejection>,
) -> Result<Json<VerifyZkEmailResponse>, ApiError> {
    let Json(req) = payload.map_err(rejected)?;
    Uuid::parse_str(&req.session_id)
        .map_err(|_| ApiError::invalid_input("sessionId must be a UUID"))?;
    let proof = parse_prefixed_hex("proof", &req.proof)?;
    let nullifier = parse_bytes32("nullifier", &req.nullifier)?;
    let user_op_hash = parse_bytes32("userOpHash", &req.user_op_hash)?;

    let session = state.sessions().consume(&req.session_id)?;
    match redeem_session(&state, &session, &proof, nullifier, user_op_hash).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            state.sessions().restore(session);
            Err(err)
        }
    }
}

async fn redeem_session(
    state: &AppState,
    session: &PendingSession,
    proof: &[u8],
    nullifier: [u8; 32],
    user_op_hash: [u8; 32],
) -> Result<VerifyZkEmailResponse, ApiError> {
    let valid = state
        .verifier()
        .verify(proof, session.email_commitment, nullifier, user_op_hash)
        .await?;
    if !valid {
        warn!("Rejected zk-email proof for session {}", session.id);
        return Err(ApiError::proof_invalid());
    }

    let params = AccountDerivationParams::native(
        session.owner_address,
        session.email_commitment,
        session.salt.clone(),
    );
    let outcome = state.accounts().create_or_predict(&params).await?;
    let aa_wallet_address = checksum(&outcome.address);
    let email_commitment = format_bytes32(&session.email_commitment);

    // The commitment binds the session id, so a profile carrying it was
    // written by an earlier attempt on this same session.
    let user = match state.profiles().find_by_wallet(&aa_wallet_address)? {
        Some(existing)
            if existing.user_type == UserType::Native
                && existing.email_commitment.as_deref() == Some(email_commitment.as_str()) =>
        {
            info!("Resuming zk-email onboarding for user {}", existing.id);
            existing
        }
        _ => state.profiles().create(NewProfile {
            user_type: UserType::Native,
            email_commitment: Some(email_commitment.clone()),
            binance_wallet: None,
            aa_wallet_address: aa_wallet_address.clone(),
            owner_address: checksum(&session.owner_address),
            salt: session.salt.as_str().to_string(),
        })?,
    };
    let token = state
        .tokens()
        .issue(&user.id.to_string(), user.user_type, &aa_wallet_address)?;

    info!(
        "zk-email onboarding complete: user {} wallet {} (created: {})",
        user.id, aa_wallet_address, outcome.created
    );
    Ok(VerifyZkEmailResponse {
        aa_wallet_address,
        email_commitment,
        token,
        user_id: user.id.to_string(),
    })
}

pub(crate) async fn binance_onboard(
    State(state): State<AppState>,
    payload: Result<Json<BinanceOnboardRequest>, JsonRejection>,
) -> Result<Json<BinanceOnboardResponse>, ApiError> {
    let Json(req) = payload.map_err(rejected)?;
    if req.api_key.trim().is_empty() || req.api_secret.trim().is_empty() {
        return Err(ApiError::invalid_input("apiKey and apiSecret are required"));
    }
    let binance_wallet = parse_address("binanceWalletAddress", &req.binance_wallet_address)?;
    let owner = parse_address("ownerAddress", &req.owner_address)?;
    let salt = state.sessions().salt_policy().resolve(req.salt.as_deref())?;

    let summary = state
        .exchange()
        .fetch_wallet_summary(&req.api_key, &req.api_secret)
        .await?;

    let params = AccountDerivationParams::binance_shadow(owner, binance_wallet, salt.clone());
    let outcome = state.accounts().create_or_predict(&params).await?;
    let aa_wallet_address = checksum(&outcome.address);

    let user = state.profiles().create(NewProfile {
        user_type: UserType::BinanceShadow,
        email_commitment: None,
        binance_wallet: Some(req.binance_wallet_address.clone()),
        aa_wallet_address: aa_wallet_address.clone(),
        owner_address: checksum(&owner),
        salt: salt.as_str().to_string(),
    })?;
    let token = state
        .tokens()
        .issue(&user.id.to_string(), user.user_type, &aa_wallet_address)?;

    info!(
        "Binance onboarding complete: user {} wallet {} ({} balances)",
        user.id,
        aa_wallet_address,
        summary.balances.len()
    );
    Ok(Json(BinanceOnboardResponse {
        aa_wallet_address,
        binance_wallet_address: req.binance_wallet_address,
        balances: summary.balances,
        token,
        user_id: user.id.to_string(),
    }))
}

pub(crate) async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserProfile>, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    let claims = state.tokens().verify(token)?;
    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("token subject is not a user id"))?;
    Ok(Json(state.profiles().find_by_id(&id)?))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}
