//! Extension system: the API extensions program against, plus the host-side
//! registries for HTTP routes, commands, and lifecycle hooks.
//!
//! Extensions load once at startup and live for the process lifetime. The
//! gateway never depends on an extension's internals — everything goes
//! through [`api::ExtensionApi`].

pub mod api;
pub mod hooks;
pub mod host;

pub use {
    api::{
        CommandContext, CommandHandler, CommandSpec, Extension, ExtensionApi, RegistryError,
        RouteHandler, RouteRequest, RouteResponse,
    },
    hooks::{AgentStartEvent, HookEvent, HookHandler, HookName, HookOverride, MessageEvent},
    host::{CommandError, CommandInfo, ExtensionHost},
};
