use std::{collections::HashMap, sync::RwLock};

use tracing::{debug, info, warn};

use crate::{
    api::{
        CommandContext, CommandSpec, Extension, ExtensionApi, RegistryError, RouteHandler,
        RouteRequest, RouteResponse,
    },
    hooks::{HookEvent, HookHandler, HookName, HookOverride},
};

// ── Types ────────────────────────────────────────────────────────────────────

/// Errors surfaced to a command's caller (the channel adapter).
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("command requires authentication: {0}")]
    RequiresAuth(String),
    /// Handler returned an error; detail is logged server-side only.
    #[error("command failed: {0}")]
    Failed(String),
}

/// Summary of a registered command, for help/status surfaces.
#[derive(Debug, Clone)]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
    pub requires_auth: bool,
}

// ── Host ─────────────────────────────────────────────────────────────────────

/// Host-side registries for everything extensions attach to the gateway.
///
/// Registration happens at startup; dispatch runs concurrently afterwards.
/// Handlers are cloned out of the lock before being awaited, so no lock is
/// held across handler I/O.
#[derive(Default)]
pub struct ExtensionHost {
    routes: RwLock<HashMap<String, RouteHandler>>,
    commands: RwLock<HashMap<String, CommandSpec>>,
    hooks: RwLock<HashMap<HookName, Vec<HookHandler>>>,
}

impl ExtensionHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run an extension's setup against this host. A failing extension is
    /// reported to the caller; it must not take the gateway down.
    pub async fn load(&self, extension: &dyn Extension) -> anyhow::Result<()> {
        extension.setup(self).await?;
        info!(extension = extension.name(), "extension loaded");
        Ok(())
    }

    pub fn has_route(&self, path: &str) -> bool {
        self.routes
            .read()
            .map(|r| r.contains_key(path))
            .unwrap_or(false)
    }

    pub fn commands(&self) -> Vec<CommandInfo> {
        let mut list: Vec<CommandInfo> = self
            .commands
            .read()
            .map(|c| {
                c.values()
                    .map(|s| CommandInfo {
                        name: s.name.clone(),
                        description: s.description.clone(),
                        requires_auth: s.requires_auth,
                    })
                    .collect()
            })
            .unwrap_or_default();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    // ── Dispatch ─────────────────────────────────────────────────────────

    /// Dispatch a request to the extension route registered for its exact
    /// path. Returns `None` when no route matches (the gateway 404s).
    /// A handler error becomes a generic 500 — detail stays in the logs.
    pub async fn dispatch_route(&self, req: RouteRequest) -> Option<RouteResponse> {
        let handler = self
            .routes
            .read()
            .ok()
            .and_then(|r| r.get(&req.path).cloned())?;

        let path = req.path.clone();
        debug!(path, "dispatching extension route");
        match handler(req).await {
            Ok(res) => Some(res),
            Err(e) => {
                warn!(path, error = %e, "extension route handler failed");
                Some(RouteResponse::html(
                    500,
                    "<h1>Internal Error</h1><p>Something went wrong.</p>",
                ))
            },
        }
    }

    /// Dispatch a command invoked from a messaging channel.
    ///
    /// `authenticated` is the caller's knowledge of the invoking channel;
    /// commands with `requires_auth = false` run regardless, which is what
    /// lets a login command bootstrap authentication.
    pub async fn dispatch_command(
        &self,
        name: &str,
        ctx: CommandContext,
        authenticated: bool,
    ) -> Result<String, CommandError> {
        let spec = self
            .commands
            .read()
            .ok()
            .and_then(|c| c.get(name).cloned())
            .ok_or_else(|| CommandError::Unknown(name.to_string()))?;

        if spec.requires_auth && !authenticated {
            return Err(CommandError::RequiresAuth(name.to_string()));
        }

        match (spec.handler)(ctx).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!(command = name, error = %e, "command handler failed");
                Err(CommandError::Failed(name.to_string()))
            },
        }
    }

    /// Dispatch a hook event to every subscriber, in registration order.
    ///
    /// All subscribers run even after one returns an override; the last
    /// override returned wins. A subscriber error is logged and skipped —
    /// it never short-circuits the remaining subscribers.
    pub async fn dispatch_hook(&self, event: HookEvent) -> Option<HookOverride> {
        let handlers: Vec<HookHandler> = self
            .hooks
            .read()
            .ok()
            .and_then(|h| h.get(&event.name()).cloned())
            .unwrap_or_default();

        let mut winner = None;
        for handler in handlers {
            match handler(event.clone()).await {
                Ok(Some(ov)) => winner = Some(ov),
                Ok(None) => {},
                Err(e) => {
                    warn!(hook = ?event.name(), error = %e, "hook subscriber failed");
                },
            }
        }
        winner
    }
}

impl ExtensionApi for ExtensionHost {
    fn register_http_route(&self, path: &str, handler: RouteHandler) -> Result<(), RegistryError> {
        let Ok(mut routes) = self.routes.write() else {
            return Err(RegistryError::DuplicateRoute(path.to_string()));
        };
        if routes.contains_key(path) {
            return Err(RegistryError::DuplicateRoute(path.to_string()));
        }
        routes.insert(path.to_string(), handler);
        debug!(path, "http route registered");
        Ok(())
    }

    fn register_command(&self, spec: CommandSpec) -> Result<(), RegistryError> {
        let Ok(mut commands) = self.commands.write() else {
            return Err(RegistryError::DuplicateCommand(spec.name));
        };
        if commands.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateCommand(spec.name));
        }
        debug!(command = %spec.name, requires_auth = spec.requires_auth, "command registered");
        commands.insert(spec.name.clone(), spec);
        Ok(())
    }

    fn on(&self, hook: HookName, handler: HookHandler) {
        if let Ok(mut hooks) = self.hooks.write() {
            hooks.entry(hook).or_default().push(handler);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::hooks::MessageEvent;

    fn text_route(body: &'static str) -> RouteHandler {
        Arc::new(move |_req| Box::pin(async move { Ok(RouteResponse::text(200, body)) }))
    }

    fn echo_command(name: &str, requires_auth: bool) -> CommandSpec {
        CommandSpec {
            name: name.into(),
            description: "test".into(),
            requires_auth,
            handler: Arc::new(|ctx: CommandContext| {
                Box::pin(async move { Ok(format!("hello {}", ctx.channel_id)) })
            }),
        }
    }

    #[tokio::test]
    async fn duplicate_route_is_rejected() {
        let host = ExtensionHost::new();
        host.register_http_route("/a", text_route("one")).unwrap();
        let err = host.register_http_route("/a", text_route("two"));
        assert!(matches!(err, Err(RegistryError::DuplicateRoute(_))));

        // First registration still serves.
        let res = host
            .dispatch_route(RouteRequest::new("/a"))
            .await
            .unwrap();
        assert_eq!(res.body, "one");
    }

    #[tokio::test]
    async fn unknown_route_is_none() {
        let host = ExtensionHost::new();
        assert!(host.dispatch_route(RouteRequest::new("/nope")).await.is_none());
    }

    #[tokio::test]
    async fn erroring_route_becomes_generic_500() {
        let host = ExtensionHost::new();
        host.register_http_route(
            "/boom",
            Arc::new(|_req| Box::pin(async { anyhow::bail!("secret detail") })),
        )
        .unwrap();

        let res = host
            .dispatch_route(RouteRequest::new("/boom"))
            .await
            .unwrap();
        assert_eq!(res.status, 500);
        assert!(!res.body.contains("secret detail"));
    }

    #[tokio::test]
    async fn command_requires_auth_gating() {
        let host = ExtensionHost::new();
        host.register_command(echo_command("login", false)).unwrap();
        host.register_command(echo_command("secrets", true)).unwrap();

        let ctx = CommandContext {
            channel_id: "555".into(),
        };
        // requires_auth=false commands stay reachable while unauthenticated.
        let reply = host
            .dispatch_command("login", ctx.clone(), false)
            .await
            .unwrap();
        assert_eq!(reply, "hello 555");

        let err = host.dispatch_command("secrets", ctx.clone(), false).await;
        assert!(matches!(err, Err(CommandError::RequiresAuth(_))));

        let ok = host.dispatch_command("secrets", ctx, true).await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn duplicate_command_is_rejected() {
        let host = ExtensionHost::new();
        host.register_command(echo_command("login", false)).unwrap();
        let err = host.register_command(echo_command("login", false));
        assert!(matches!(err, Err(RegistryError::DuplicateCommand(_))));
    }

    #[tokio::test]
    async fn hooks_run_in_order_and_last_override_wins() {
        let host = ExtensionHost::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&calls);
        host.on(
            HookName::MessageReceived,
            Arc::new(move |_ev| {
                let c = Arc::clone(&c1);
                Box::pin(async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(HookOverride {
                        system_prompt: "first".into(),
                    }))
                })
            }),
        );
        let c2 = Arc::clone(&calls);
        host.on(
            HookName::MessageReceived,
            Arc::new(move |_ev| {
                let c = Arc::clone(&c2);
                Box::pin(async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(HookOverride {
                        system_prompt: "second".into(),
                    }))
                })
            }),
        );

        let ov = host
            .dispatch_hook(HookEvent::MessageReceived(MessageEvent {
                from: "u".into(),
                channel_id: "1".into(),
            }))
            .await
            .unwrap();

        // Both subscribers ran; the later registration's override won.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(ov.system_prompt, "second");
    }

    #[tokio::test]
    async fn erroring_hook_subscriber_is_skipped() {
        let host = ExtensionHost::new();
        host.on(
            HookName::BeforeAgentStart,
            Arc::new(|_ev| Box::pin(async { anyhow::bail!("subscriber broke") })),
        );
        host.on(
            HookName::BeforeAgentStart,
            Arc::new(|_ev| {
                Box::pin(async {
                    Ok(Some(HookOverride {
                        system_prompt: "still here".into(),
                    }))
                })
            }),
        );

        let ov = host
            .dispatch_hook(HookEvent::BeforeAgentStart(crate::hooks::AgentStartEvent {
                prompt: "p".into(),
                session_key: "telegram:1:default".into(),
                agent_id: "main".into(),
            }))
            .await
            .unwrap();
        assert_eq!(ov.system_prompt, "still here");
    }
}
