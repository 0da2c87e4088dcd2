//! alpha-backend
//!
//! Axum service that onboards users onto email-bound smart accounts.
//!
//! # Features
//! - zk-email sessions: commit to an email, then redeem the commitment with a
//!   proof checked by the configured verifier
//! - Binance onboarding: snapshot an exchange account and derive a shadow
//!   smart account for its wallet
//! - Deterministic account derivation with create-else-predict fallback
//! - HS256 bearer tokens and user profiles (in memory or sled)

use std::{net::SocketAddr, sync::Arc};

use alpha_chain::{AccountService, EmailProofVerifier, VerifierMode};
use anyhow::{bail, Context};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub mod config;
pub mod error;
pub mod exchange;
pub mod profiles;
mod routes;
pub mod session;
pub mod token;

pub use config::AppConfig;
pub use error::{ApiError, ErrorResponse};
pub use exchange::{BinanceClient, ExchangeClient, ExchangeError, WalletSummary};
pub use profiles::{NewProfile, ProfileError, ProfilePatch, ProfileStore, UserProfile};
pub use routes::{
    BinanceOnboardRequest, BinanceOnboardResponse, HealthResponse, InitiateZkEmailRequest,
    InitiateZkEmailResponse, VerifyZkEmailRequest, VerifyZkEmailResponse,
};
pub use session::{InMemorySessionStore, PendingSession, SessionRegistry, SessionStore};
pub use token::{Claims, TokenIssuer};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    sessions: SessionRegistry,
    verifier: Arc<dyn EmailProofVerifier>,
    accounts: AccountService,
    profiles: ProfileStore,
    tokens: TokenIssuer,
    exchange: Arc<dyn ExchangeClient>,
}

impl AppState {
    pub fn with_components(
        sessions: SessionRegistry,
        verifier: Arc<dyn EmailProofVerifier>,
        accounts: AccountService,
        profiles: ProfileStore,
        tokens: TokenIssuer,
        exchange: Arc<dyn ExchangeClient>,
    ) -> Self {
        Self {
            sessions,
            verifier,
            accounts,
            profiles,
            tokens,
            exchange,
        }
    }

    /// Wire every collaborator from `config`.
    ///
    /// A deployment without a verifier address only starts when unverified
    /// proofs are explicitly allowed.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let (accounts, verifier) =
            alpha_chain::connect(&config.chain).context("failed to configure chain clients")?;

        if verifier.mode() == VerifierMode::AcceptAll {
            if !config.allow_unverified_proofs {
                bail!(
                    "{} is not set; set {}=true to accept zk-email proofs without verification",
                    config::VERIFIER_ADDRESS_ENV,
                    config::ALLOW_UNVERIFIED_ENV
                );
            }
            warn!("zk-email proofs will NOT be verified: no verifier contract configured");
        }

        let profiles = match &config.profile_db {
            Some(path) => ProfileStore::persistent(path)?,
            None => ProfileStore::in_memory(),
        };

        Ok(Self::with_components(
            SessionRegistry::in_memory(config.session_ttl, config.salt_policy),
            Arc::new(verifier),
            accounts,
            profiles,
            TokenIssuer::new(config.jwt_secret.as_bytes(), config.jwt_ttl),
            Arc::new(BinanceClient::new(config.binance_api_url.clone())),
        ))
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn verifier(&self) -> &dyn EmailProofVerifier {
        self.verifier.as_ref()
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn exchange(&self) -> &dyn ExchangeClient {
        self.exchange.as_ref()
    }
}

/// Build the router.
pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/auth/zk-email/init", post(routes::zk_email_init))
        .route("/auth/zk-email/verify", post(routes::zk_email_verify))
        .route("/auth/binance/onboard", post(routes::binance_onboard))
        .route("/users/me", get(routes::current_user))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Alpha Builder backend listening on {}", addr);

    axum::serve(listener, app_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to install Ctrl-C handler: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
