//! Config schema types (gateway binding/auth, Google access-gate extension).

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DoormanConfig {
    pub gateway: GatewayConfig,
    pub google_auth: GoogleAuthConfig,
}

// ── Gateway ──────────────────────────────────────────────────────────────────

/// Which interface the gateway listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Listen on 127.0.0.1 only. A network-exposure control, not an auth
    /// bypass: the auth mode is still enforced on top.
    Loopback,
    /// Listen on all interfaces.
    Public,
}

/// How inbound HTTP requests authenticate to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// No gateway-level auth. Intended only for loopback binds.
    None,
    /// Shared bearer token, compared in constant time.
    Token,
}

/// Gateway listener and auth settings. Immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind_mode: BindMode,
    pub auth_mode: AuthMode,
    /// Shared secret for `AuthMode::Token`.
    pub token: Option<String>,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_mode: BindMode::Loopback,
            auth_mode: AuthMode::Token,
            token: None,
            port: 18789,
        }
    }
}

impl GatewayConfig {
    /// Listen address for the configured bind mode.
    pub fn bind_address(&self) -> &'static str {
        match self.bind_mode {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Public => "0.0.0.0",
        }
    }
}

// ── Google access gate ───────────────────────────────────────────────────────

/// Settings for the Google access-gate extension.
///
/// When the client credentials are absent the extension stays loaded but
/// passes all traffic through unmodified (fail-open). This is deliberate so
/// that deployments without the gate configured keep working.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Overrides the derived `<gateway_base_url>/auth/google/callback`.
    pub redirect_uri: Option<String>,
    /// Empty list means every verified Google account is accepted.
    pub allowed_emails: Vec<String>,
    /// Base URL the gateway is reachable at from a user's browser.
    pub gateway_base_url: String,
    /// How long an issued login state token stays valid.
    pub pending_ttl_secs: u64,
    /// Period of the background sweep that evicts expired state tokens.
    /// Must be <= `pending_ttl_secs` to bound staleness.
    pub sweep_interval_secs: u64,
}

impl Default for GoogleAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            allowed_emails: Vec::new(),
            gateway_base_url: "http://127.0.0.1:18789".into(),
            pending_ttl_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

impl GoogleAuthConfig {
    /// Whether the gate actively enforces authentication. Explicit predicate
    /// so the fail-open policy is visible and testable.
    pub fn enforcement_enabled(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Effective OAuth redirect URI.
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri.clone().unwrap_or_else(|| {
            format!(
                "{}/auth/google/callback",
                self.gateway_base_url.trim_end_matches('/')
            )
        })
    }

    /// URL a user opens to start the login flow for their channel.
    pub fn login_url(&self, channel_id: &str) -> String {
        format!(
            "{}/auth/google/login?chatId={}",
            self.gateway_base_url.trim_end_matches('/'),
            urlencoding::encode(channel_id)
        )
    }
}
