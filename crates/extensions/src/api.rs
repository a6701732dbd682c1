use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use async_trait::async_trait;

use crate::hooks::{HookHandler, HookName};

// ── HTTP routes ──────────────────────────────────────────────────────────────

/// An inbound HTTP request as seen by an extension route handler.
///
/// Extensions only get requests that already passed the gateway auth gate.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub path: String,
    pub query: HashMap<String, String>,
}

impl RouteRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: HashMap::new(),
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }
}

/// Response produced by an extension route handler. The gateway converts it
/// into a real HTTP response and still applies the security headers on top.
#[derive(Debug, Clone)]
pub struct RouteResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
    /// Extra headers (e.g. Location for redirects).
    pub headers: Vec<(String, String)>,
}

impl RouteResponse {
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/html; charset=utf-8".into(),
            body: body.into(),
            headers: Vec::new(),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8".into(),
            body: body.into(),
            headers: Vec::new(),
        }
    }

    /// 302 redirect to `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: 302,
            content_type: "text/html; charset=utf-8".into(),
            body: String::new(),
            headers: vec![("location".into(), location.into())],
        }
    }
}

pub type RouteFuture = Pin<Box<dyn Future<Output = anyhow::Result<RouteResponse>> + Send>>;

/// A boxed async route handler.
pub type RouteHandler = Arc<dyn Fn(RouteRequest) -> RouteFuture + Send + Sync>;

// ── Commands ─────────────────────────────────────────────────────────────────

/// Context for a user-invoked command: who is asking, on which channel.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Messaging-platform channel identity (e.g. a chat id).
    pub channel_id: String,
}

pub type CommandFuture = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>>;

/// A boxed async command handler, returning the text reply for the channel.
pub type CommandHandler = Arc<dyn Fn(CommandContext) -> CommandFuture + Send + Sync>;

/// A user-invokable command registered by an extension.
///
/// Commands with `requires_auth = false` stay reachable for unauthenticated
/// channels — that is how a login command bootstraps authentication.
#[derive(Clone)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub requires_auth: bool,
    pub handler: CommandHandler,
}

// ── Registration ─────────────────────────────────────────────────────────────

/// Errors surfaced at registration time.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Duplicate paths are rejected rather than last-wins, so a misbehaving
    /// extension cannot silently shadow another one's route.
    #[error("route already registered: {0}")]
    DuplicateRoute(String),
    #[error("command already registered: {0}")]
    DuplicateCommand(String),
}

/// The capability surface the host hands to each extension during setup.
///
/// Implemented by [`crate::host::ExtensionHost`] in production and trivially
/// substitutable with a test double.
pub trait ExtensionApi: Send + Sync {
    /// Register exactly one handler for an exact path. Registration order
    /// does not imply dispatch priority; paths must be unique.
    fn register_http_route(&self, path: &str, handler: RouteHandler) -> Result<(), RegistryError>;

    /// Register a user-invokable command.
    fn register_command(&self, spec: CommandSpec) -> Result<(), RegistryError>;

    /// Subscribe to a lifecycle hook. Subscriptions live for the process
    /// lifetime; there is no unsubscribe.
    fn on(&self, hook: HookName, handler: HookHandler);
}

/// An externally loaded unit of functionality.
#[async_trait]
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    /// Attach routes, commands, and hooks to the host. Runs once at startup.
    async fn setup(&self, api: &dyn ExtensionApi) -> anyhow::Result<()>;
}
