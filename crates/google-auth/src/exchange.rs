//! Authorization-code-to-identity exchange against Google's OAuth endpoints.

use std::time::Duration;

use {serde::Deserialize, tracing::warn};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

use doorman_config::GoogleAuthConfig;

pub const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// The token exchange is the only outbound network call in the login path;
/// it gets an explicit timeout instead of relying on client defaults.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// Non-2xx from the token endpoint. The body is logged, never shown.
    #[error("provider returned status {status}")]
    Provider { status: u16, body: String },
    #[error("token exchange transport failure")]
    Transport(#[from] reqwest::Error),
    #[error("token response carried no id_token")]
    MissingIdToken,
    #[error("identity token payload is malformed")]
    MalformedToken,
    #[error("identity token carries no email claim")]
    EmailMissing,
    #[error("email is not verified by the provider")]
    EmailUnverified,
    #[error("email not on the allow-list: {0}")]
    NotAllowed(String),
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

/// Claims extracted from the identity token payload.
#[derive(Debug, Clone, Deserialize)]
pub struct IdClaims {
    pub email: Option<String>,
    /// Google sends a bool, but some providers stringify it.
    #[serde(default)]
    pub email_verified: Option<serde_json::Value>,
}

impl IdClaims {
    pub fn is_verified(&self) -> bool {
        match &self.email_verified {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s == "true",
            _ => false,
        }
    }
}

/// Decode the payload segment of an identity token.
///
/// The signature is NOT verified — this mirrors the upstream demo-grade
/// design and is the known security gap here. Hardening would check the
/// token against Google's published JWKS before trusting any claim.
pub fn decode_id_token(id_token: &str) -> Result<IdClaims, ExchangeError> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or(ExchangeError::MalformedToken)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| ExchangeError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| ExchangeError::MalformedToken)
}

// ── Exchange client ──────────────────────────────────────────────────────────

/// Performs the code-for-identity exchange and validates the email claim.
#[derive(Debug, Clone)]
pub struct GoogleExchange {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    allowed_emails: Vec<String>,
    token_endpoint: String,
}

impl GoogleExchange {
    /// Returns `None` when client credentials are unconfigured — the caller
    /// degrades to fail-open rather than erroring.
    pub fn new(config: &GoogleAuthConfig) -> Option<Self> {
        let client_id = config.client_id.clone()?;
        let client_secret = config.client_secret.clone()?;
        let http = reqwest::Client::builder()
            .timeout(EXCHANGE_TIMEOUT)
            .build()
            .ok()?;
        Some(Self {
            http,
            client_id,
            client_secret,
            redirect_uri: config.redirect_uri(),
            allowed_emails: config.allowed_emails.clone(),
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.into(),
        })
    }

    /// Point the exchange at a different token endpoint (tests).
    pub fn with_token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint = url.into();
        self
    }

    /// Provider authorization URL with the given state token bound in.
    pub fn auth_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&prompt=select_account",
            GOOGLE_AUTH_ENDPOINT,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode("openid email"),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for the identity token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, ExchangeError> {
        let res = self
            .http
            .post(&self.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("redirect_uri", &self.redirect_uri),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body, "token exchange rejected by provider");
            return Err(ExchangeError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let tokens: TokenResponse = res.json().await?;
        tokens.id_token.ok_or(ExchangeError::MissingIdToken)
    }

    /// Validate the email claim: present, verified, and on the allow-list
    /// (when one is configured).
    pub fn verify_email(&self, claims: &IdClaims) -> Result<String, ExchangeError> {
        let email = claims.email.clone().ok_or(ExchangeError::EmailMissing)?;
        if !claims.is_verified() {
            return Err(ExchangeError::EmailUnverified);
        }
        if !self.allowed_emails.is_empty()
            && !self
                .allowed_emails
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&email))
        {
            return Err(ExchangeError::NotAllowed(email));
        }
        Ok(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_id_token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("{header}.{payload}.sig")
    }

    fn exchange_with_allowlist(allowed: Vec<String>) -> GoogleExchange {
        let config = GoogleAuthConfig {
            client_id: Some("cid".into()),
            client_secret: Some("cs".into()),
            allowed_emails: allowed,
            ..Default::default()
        };
        GoogleExchange::new(&config).unwrap()
    }

    #[test]
    fn new_requires_credentials() {
        assert!(GoogleExchange::new(&GoogleAuthConfig::default()).is_none());
    }

    #[test]
    fn decodes_payload_claims() {
        let token = fake_id_token(&serde_json::json!({
            "email": "user@example.com",
            "email_verified": true,
        }));
        let claims = decode_id_token(&token).unwrap();
        assert_eq!(claims.email.as_deref(), Some("user@example.com"));
        assert!(claims.is_verified());
    }

    #[test]
    fn stringified_verified_flag_counts() {
        let token = fake_id_token(&serde_json::json!({
            "email": "user@example.com",
            "email_verified": "true",
        }));
        assert!(decode_id_token(&token).unwrap().is_verified());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(matches!(
            decode_id_token("no-dots-here"),
            Err(ExchangeError::MalformedToken)
        ));
        assert!(matches!(
            decode_id_token("a.!!!notbase64!!!.c"),
            Err(ExchangeError::MalformedToken)
        ));
    }

    #[test]
    fn unverified_email_is_rejected() {
        let ex = exchange_with_allowlist(vec![]);
        let claims = IdClaims {
            email: Some("user@example.com".into()),
            email_verified: Some(serde_json::Value::Bool(false)),
        };
        assert!(matches!(
            ex.verify_email(&claims),
            Err(ExchangeError::EmailUnverified)
        ));
    }

    #[test]
    fn missing_email_is_rejected() {
        let ex = exchange_with_allowlist(vec![]);
        let claims = IdClaims {
            email: None,
            email_verified: Some(serde_json::Value::Bool(true)),
        };
        assert!(matches!(
            ex.verify_email(&claims),
            Err(ExchangeError::EmailMissing)
        ));
    }

    #[test]
    fn allowlist_filters_emails() {
        let ex = exchange_with_allowlist(vec!["a@x.com".into()]);
        let ok = IdClaims {
            email: Some("A@x.com".into()),
            email_verified: Some(serde_json::Value::Bool(true)),
        };
        assert_eq!(ex.verify_email(&ok).unwrap(), "A@x.com");

        let denied = IdClaims {
            email: Some("b@x.com".into()),
            email_verified: Some(serde_json::Value::Bool(true)),
        };
        assert!(matches!(
            ex.verify_email(&denied),
            Err(ExchangeError::NotAllowed(_))
        ));
    }

    #[test]
    fn auth_url_carries_state_and_redirect() {
        let ex = exchange_with_allowlist(vec![]);
        let url = ex.auth_url("state-123");
        assert!(url.starts_with(GOOGLE_AUTH_ENDPOINT));
        assert!(url.contains("state=state-123"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("openid%20email"));
    }
}
