use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    tracing::{info, warn},
};

use {
    doorman_config::GoogleAuthConfig,
    doorman_extensions::{
        CommandSpec, Extension, ExtensionApi, HookEvent, HookName, HookOverride, RegistryError,
        RouteResponse,
    },
};

use crate::{
    exchange::{ExchangeError, GoogleExchange, decode_id_token},
    identity::IdentityTable,
    pages,
    store::PendingAuthStore,
};

pub const LOGIN_PATH: &str = "/auth/google/login";
pub const CALLBACK_PATH: &str = "/auth/google/callback";

/// System prompt forced onto the agent for unauthenticated channels.
const LOGIN_REQUIRED_PROMPT: &str = "The user has not linked a verified Google account, so you \
     must not act on their request. Politely refuse every substantive question or task, explain \
     that sign-in is required, and point them to the /login command.";

/// The Google access-gate extension.
///
/// Enforcement is split across two hooks on purpose (the host runtime's hook
/// contract is fixed): `message_received` only logs, `before_agent_start` is
/// the binding enforcement point. With no provider credentials configured,
/// both hooks pass all traffic through unmodified — fail-open by design for
/// deployments that don't use the gate.
pub struct GoogleAuthExtension {
    config: GoogleAuthConfig,
    store: Arc<PendingAuthStore>,
    identities: Arc<IdentityTable>,
    exchange: Option<Arc<GoogleExchange>>,
}

impl GoogleAuthExtension {
    pub fn new(config: GoogleAuthConfig) -> Self {
        let exchange = GoogleExchange::new(&config).map(Arc::new);
        let store = Arc::new(PendingAuthStore::new(Duration::from_secs(
            config.pending_ttl_secs,
        )));
        Self {
            config,
            store,
            identities: Arc::new(IdentityTable::new()),
            exchange,
        }
    }

    /// Point the code exchange at a different token endpoint (tests).
    pub fn with_token_endpoint(mut self, url: impl Into<String>) -> Self {
        if let Some(ex) = self.exchange.take() {
            self.exchange = Some(Arc::new(ex.as_ref().clone().with_token_endpoint(url)));
        }
        self
    }

    pub fn store(&self) -> Arc<PendingAuthStore> {
        Arc::clone(&self.store)
    }

    pub fn identities(&self) -> Arc<IdentityTable> {
        Arc::clone(&self.identities)
    }

    // ── Routes ───────────────────────────────────────────────────────────

    fn register_routes(&self, api: &dyn ExtensionApi) -> Result<(), RegistryError> {
        let store = Arc::clone(&self.store);
        let exchange = self.exchange.clone();
        api.register_http_route(
            LOGIN_PATH,
            Arc::new(move |req| {
                let store = Arc::clone(&store);
                let exchange = exchange.clone();
                Box::pin(async move {
                    let Some(exchange) = exchange else {
                        return Ok(RouteResponse::html(
                            500,
                            pages::error(
                                "Not Configured",
                                "Google sign-in is not configured on this gateway.",
                            ),
                        ));
                    };
                    let Some(chat_id) = req.query("chatId") else {
                        return Ok(RouteResponse::html(
                            400,
                            pages::error(
                                "Missing Parameter",
                                "The chatId query parameter is required.",
                            ),
                        ));
                    };
                    let state = store.issue_state(chat_id).await;
                    Ok(RouteResponse::redirect(exchange.auth_url(&state)))
                })
            }),
        )?;

        let store = Arc::clone(&self.store);
        let identities = Arc::clone(&self.identities);
        let exchange = self.exchange.clone();
        api.register_http_route(
            CALLBACK_PATH,
            Arc::new(move |req| {
                let store = Arc::clone(&store);
                let identities = Arc::clone(&identities);
                let exchange = exchange.clone();
                Box::pin(async move {
                    // Provider-reported error: the store stays untouched.
                    if let Some(err) = req.query("error") {
                        warn!(error = err, "provider returned an error on callback");
                        return Ok(RouteResponse::html(
                            400,
                            pages::error(
                                "Authorization Failed",
                                "The provider reported an error. Start over with /login.",
                            ),
                        ));
                    }
                    let (Some(code), Some(state)) = (req.query("code"), req.query("state"))
                    else {
                        return Ok(RouteResponse::html(
                            400,
                            pages::error("Malformed Callback", "Required parameters are missing."),
                        ));
                    };
                    let Some(exchange) = exchange else {
                        return Ok(RouteResponse::html(
                            500,
                            pages::error(
                                "Not Configured",
                                "Google sign-in is not configured on this gateway.",
                            ),
                        ));
                    };

                    // The state lookup is the sole check binding this
                    // callback to a prior login request. Consumed before the
                    // network call so no lock spans the exchange.
                    let Some(pending) = store.consume_state(state).await else {
                        return Ok(RouteResponse::html(
                            400,
                            pages::error(
                                "Invalid or Expired Session",
                                "This sign-in link is no longer valid. Start over with /login.",
                            ),
                        ));
                    };

                    let id_token = match exchange.exchange_code(code).await {
                        Ok(token) => token,
                        Err(e) => return Ok(failure_page(&e)),
                    };
                    let claims = match decode_id_token(&id_token) {
                        Ok(claims) => claims,
                        Err(e) => return Ok(failure_page(&e)),
                    };
                    let email = match exchange.verify_email(&claims) {
                        Ok(email) => email,
                        Err(e) => return Ok(failure_page(&e)),
                    };

                    identities.set(&pending.channel_id, &email).await;
                    info!(channel_id = %pending.channel_id, email = %email, "channel authenticated");
                    Ok(RouteResponse::html(200, pages::success(&email)))
                })
            }),
        )?;

        Ok(())
    }

    // ── Commands ─────────────────────────────────────────────────────────

    fn register_commands(&self, api: &dyn ExtensionApi) -> Result<(), RegistryError> {
        // All three stay reachable for unauthenticated channels — login has
        // to bootstrap authentication.
        let config = self.config.clone();
        api.register_command(CommandSpec {
            name: "login".into(),
            description: "Link your Google account to use this agent.".into(),
            requires_auth: false,
            handler: Arc::new(move |ctx| {
                let config = config.clone();
                Box::pin(async move {
                    if !config.enforcement_enabled() {
                        return Ok("Google sign-in is not configured on this gateway.".into());
                    }
                    Ok(format!(
                        "Open this link to sign in with Google:\n{}",
                        config.login_url(&ctx.channel_id)
                    ))
                })
            }),
        })?;

        let identities = Arc::clone(&self.identities);
        let enabled = self.config.enforcement_enabled();
        api.register_command(CommandSpec {
            name: "authstatus".into(),
            description: "Show whether this chat is linked to a Google account.".into(),
            requires_auth: false,
            handler: Arc::new(move |ctx| {
                let identities = Arc::clone(&identities);
                Box::pin(async move {
                    if !enabled {
                        return Ok("Access gating is disabled on this gateway.".into());
                    }
                    Ok(match identities.get(&ctx.channel_id).await {
                        Some(email) => format!("Authenticated as {email}."),
                        None => "Not authenticated. Use /login to sign in.".into(),
                    })
                })
            }),
        })?;

        let identities = Arc::clone(&self.identities);
        api.register_command(CommandSpec {
            name: "logout".into(),
            description: "Unlink the Google account from this chat.".into(),
            requires_auth: false,
            handler: Arc::new(move |ctx| {
                let identities = Arc::clone(&identities);
                Box::pin(async move {
                    Ok(match identities.remove(&ctx.channel_id).await {
                        Some(email) => format!("Signed out {email}."),
                        None => "You were not signed in.".into(),
                    })
                })
            }),
        })?;

        Ok(())
    }

    // ── Hooks ────────────────────────────────────────────────────────────

    fn register_hooks(&self, api: &dyn ExtensionApi) {
        let enabled = self.config.enforcement_enabled();

        // Advisory layer: log only, never block.
        let identities = Arc::clone(&self.identities);
        api.on(
            HookName::MessageReceived,
            Arc::new(move |ev| {
                let identities = Arc::clone(&identities);
                Box::pin(async move {
                    if !enabled {
                        return Ok(None);
                    }
                    let HookEvent::MessageReceived(msg) = ev else {
                        return Ok(None);
                    };
                    if !identities.is_authenticated(&msg.channel_id).await {
                        info!(
                            channel_id = %msg.channel_id,
                            from = %msg.from,
                            "message from unauthenticated channel; agent access will be gated"
                        );
                    }
                    Ok(None)
                })
            }),
        );

        // Enforcement layer: override the system prompt until the channel
        // authenticates.
        let identities = Arc::clone(&self.identities);
        api.on(
            HookName::BeforeAgentStart,
            Arc::new(move |ev| {
                let identities = Arc::clone(&identities);
                Box::pin(async move {
                    if !enabled {
                        return Ok(None);
                    }
                    let HookEvent::BeforeAgentStart(start) = ev else {
                        return Ok(None);
                    };
                    let Some(channel_id) = channel_id_from_session_key(&start.session_key)
                    else {
                        return Ok(None);
                    };
                    if identities.is_authenticated(channel_id).await {
                        return Ok(None);
                    }
                    info!(
                        channel_id,
                        session_key = %start.session_key,
                        "overriding system prompt for unauthenticated channel"
                    );
                    Ok(Some(HookOverride {
                        system_prompt: LOGIN_REQUIRED_PROMPT.into(),
                    }))
                })
            }),
        );
    }
}

#[async_trait]
impl Extension for GoogleAuthExtension {
    fn name(&self) -> &str {
        "google-auth"
    }

    async fn setup(&self, api: &dyn ExtensionApi) -> anyhow::Result<()> {
        if !self.config.enforcement_enabled() {
            warn!("google auth credentials unconfigured; access gate is fail-open");
        }
        self.register_routes(api)?;
        self.register_commands(api)?;
        self.register_hooks(api);
        if self.config.enforcement_enabled() {
            self.store
                .spawn_sweeper(Duration::from_secs(self.config.sweep_interval_secs));
        }
        Ok(())
    }
}

/// Maps an exchange failure to its user-facing page. Detail stays in logs.
fn failure_page(err: &ExchangeError) -> RouteResponse {
    warn!(error = %err, "login callback failed");
    match err {
        ExchangeError::EmailUnverified => RouteResponse::html(
            403,
            pages::error(
                "Email Not Verified",
                "Your Google account's email address is not verified.",
            ),
        ),
        ExchangeError::NotAllowed(email) => {
            warn!(email = %email, "email rejected: not on the allow-list");
            RouteResponse::html(
                403,
                pages::error("Access Denied", "This account is not allowed on this gateway."),
            )
        },
        _ => RouteResponse::html(
            500,
            pages::error(
                "Login Failed",
                "Could not complete sign-in. Try again with /login.",
            ),
        ),
    }
}

/// Derive the channel identity from a session key of the form
/// `<channel-kind>:<channel-id>:<suffix>` (second colon-delimited segment).
pub fn channel_id_from_session_key(key: &str) -> Option<&str> {
    let mut parts = key.split(':');
    let _kind = parts.next()?;
    let id = parts.next()?;
    parts.next()?; // a suffix must be present
    if id.is_empty() { None } else { Some(id) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_channel_id_from_session_key() {
        assert_eq!(
            channel_id_from_session_key("telegram:555:default"),
            Some("555")
        );
        assert_eq!(
            channel_id_from_session_key("discord:99:thread:7"),
            Some("99")
        );
    }

    #[test]
    fn rejects_keys_without_three_segments() {
        assert_eq!(channel_id_from_session_key("agent:main"), None);
        assert_eq!(channel_id_from_session_key("justakey"), None);
        assert_eq!(channel_id_from_session_key("telegram::default"), None);
    }
}
