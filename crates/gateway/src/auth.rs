use doorman_config::{AuthMode, GatewayConfig};

// ── Types ────────────────────────────────────────────────────────────────────

/// Resolved gateway auth configuration. Immutable after startup.
#[derive(Debug, Clone)]
pub struct ResolvedAuth {
    pub mode: AuthMode,
    pub token: Option<String>,
}

/// Result of an authentication attempt. Callers must emit a uniform 401 on
/// `ok = false`; `reason` is for the server log only, never the response.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub ok: bool,
    pub reason: Option<String>,
}

impl AuthResult {
    fn pass() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    fn deny(reason: &str) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Constant-time string comparison (prevents timing attacks).
fn safe_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    // XOR each byte and accumulate; any difference makes result non-zero.
    let diff = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

// ── Auth logic ───────────────────────────────────────────────────────────────

/// Resolve auth config from the gateway config section.
pub fn resolve_auth(config: &GatewayConfig) -> ResolvedAuth {
    ResolvedAuth {
        mode: config.auth_mode,
        token: config.token.clone(),
    }
}

/// Authenticate an incoming HTTP request.
///
/// Loopback binding restricts reachability at the socket level; it is not an
/// auth bypass, so this check applies regardless of bind mode.
pub fn authorize_request(auth: &ResolvedAuth, provided_token: Option<&str>) -> AuthResult {
    match auth.mode {
        AuthMode::None => AuthResult::pass(),
        AuthMode::Token => {
            let Some(expected) = auth.token.as_deref() else {
                return AuthResult::deny("token_missing_config");
            };
            let Some(given) = provided_token else {
                return AuthResult::deny("token_missing");
            };
            if !safe_equal(given, expected) {
                return AuthResult::deny("token_mismatch");
            }
            AuthResult::pass()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_auth(token: &str) -> ResolvedAuth {
        ResolvedAuth {
            mode: AuthMode::Token,
            token: Some(token.into()),
        }
    }

    #[test]
    fn safe_equal_basics() {
        assert!(safe_equal("abc", "abc"));
        assert!(!safe_equal("abc", "abd"));
        assert!(!safe_equal("abc", "abcd"));
        assert!(safe_equal("", ""));
    }

    #[test]
    fn token_mode_accepts_matching_token() {
        let auth = token_auth("test-token");
        assert!(authorize_request(&auth, Some("test-token")).ok);
    }

    #[test]
    fn token_mode_rejects_missing_or_wrong_token() {
        let auth = token_auth("test-token");
        assert!(!authorize_request(&auth, None).ok);
        assert!(!authorize_request(&auth, Some("other")).ok);
    }

    #[test]
    fn token_mode_without_configured_token_rejects_everything() {
        let auth = ResolvedAuth {
            mode: AuthMode::Token,
            token: None,
        };
        assert!(!authorize_request(&auth, Some("anything")).ok);
    }

    #[test]
    fn none_mode_passes_all() {
        let auth = ResolvedAuth {
            mode: AuthMode::None,
            token: None,
        };
        assert!(authorize_request(&auth, None).ok);
    }
}
