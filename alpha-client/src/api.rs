//! Client for the onboarding backend.

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("{message} ({status}{})", code_suffix(.code))]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("unexpected response: {0}")]
    Decode(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(", {c}")).unwrap_or_default()
}

impl ApiClientError {
    /// Backend error code, when the backend sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiClientError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    error_code: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitZkEmailRequest {
    pub email: String,
    pub owner_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitZkEmailResponse {
    pub session_id: String,
    pub email_commitment: String,
    pub salt: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyZkEmailRequest {
    pub session_id: String,
    pub proof: String,
    pub nullifier: String,
    pub user_op_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyZkEmailResponse {
    pub aa_wallet_address: String,
    pub email_commitment: String,
    pub token: String,
    pub user_id: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardBinanceRequest {
    pub api_key: String,
    pub api_secret: String,
    pub binance_wallet_address: String,
    pub owner_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BalanceView {
    pub asset: String,
    pub available: f64,
    pub locked: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardBinanceResponse {
    pub aa_wallet_address: String,
    pub binance_wallet_address: String,
    pub balances: Vec<BalanceView>,
    pub token: String,
    pub user_id: String,
}

#[derive(Clone, Debug)]
pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(base_url, reqwest::Client::new())
    }

    pub fn with_http(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn init_zk_email(
        &self,
        request: &InitZkEmailRequest,
    ) -> Result<InitZkEmailResponse, ApiClientError> {
        self.post("/auth/zk-email/init", request).await
    }

    pub async fn verify_zk_email(
        &self,
        request: &VerifyZkEmailRequest,
    ) -> Result<VerifyZkEmailResponse, ApiClientError> {
        self.post("/auth/zk-email/verify", request).await
    }

    pub async fn onboard_binance(
        &self,
        request: &OnboardBinanceRequest,
    ) -> Result<OnboardBinanceResponse, ApiClientError> {
        self.post("/auth/binance/onboard", request).await
    }

    /// Profile of the token's user, as returned by the backend.
    pub async fn current_user(&self, token: &str) -> Result<serde_json::Value, ApiClientError> {
        let response = self
            .http
            .get(format!("{}/users/me", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ApiClientError::Http(err.to_string()))?;
        decode(response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| ApiClientError::Http(err.to_string()))?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiClientError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|err| ApiClientError::Decode(err.to_string()));
    }

    let text = response.text().await.unwrap_or_default();
    Err(api_error(status, &text))
}

fn api_error(status: StatusCode, text: &str) -> ApiClientError {
    match serde_json::from_str::<ErrorBody>(text) {
        Ok(body) => ApiClientError::Api {
            status: status.as_u16(),
            code: body.error_code,
            message: body.error,
        },
        Err(_) => ApiClientError::Api {
            status: status.as_u16(),
            code: None,
            message: if text.trim().is_empty() {
                format!("Request failed with status {}", status.as_u16())
            } else {
                text.to_string()
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_errors_keep_code() {
        let err = api_error(
            StatusCode::NOT_FOUND,
            r#"{"error":"Session not found or expired","error_code":"SESSION_NOT_FOUND"}"#,
        );
        assert_eq!(err.code(), Some("SESSION_NOT_FOUND"));
        assert_eq!(
            err.to_string(),
            "Session not found or expired (404, SESSION_NOT_FOUND)"
        );
    }

    #[test]
    fn plain_errors_fall_back_to_text() {
        let err = api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.code(), None);
        assert_eq!(err.to_string(), "upstream down (502)");

        let err = api_error(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(err.to_string(), "Request failed with status 500 (500)");
    }

    #[test]
    fn optional_salt_is_omitted() {
        let body = serde_json::to_value(InitZkEmailRequest {
            email: "a@b.co".into(),
            owner_address: "0x00".into(),
            salt: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"email": "a@b.co", "ownerAddress": "0x00"}));
    }

    #[test]
    fn base_url_is_normalized() {
        assert_eq!(BackendClient::new("http://host:3000/").base_url(), "http://host:3000");
    }
}
