//! Lifecycle hook contract.
//!
//! Hooks are named points in message/agent processing where subscribers may
//! observe an event or override behavior. The hook names and event shapes
//! mirror the host agent runtime's contract and are fixed externally.

use std::{future::Future, pin::Pin, sync::Arc};

/// Named lifecycle points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    /// An inbound channel message arrived. Subscribers here are advisory:
    /// they can log or annotate but the dispatcher ignores their overrides'
    /// absence — the message continues downstream either way.
    MessageReceived,
    /// The agent is about to be invoked for a session. A subscriber may
    /// return a system-prompt override; this is the binding enforcement
    /// point for access gating.
    BeforeAgentStart,
}

/// Event for [`HookName::MessageReceived`].
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub from: String,
    pub channel_id: String,
}

/// Event for [`HookName::BeforeAgentStart`].
///
/// `session_key` format: `<channel-kind>:<channel-id>:<suffix>`.
#[derive(Debug, Clone)]
pub struct AgentStartEvent {
    pub prompt: String,
    pub session_key: String,
    pub agent_id: String,
}

/// A typed hook event, matched on by subscribers.
#[derive(Debug, Clone)]
pub enum HookEvent {
    MessageReceived(MessageEvent),
    BeforeAgentStart(AgentStartEvent),
}

impl HookEvent {
    pub fn name(&self) -> HookName {
        match self {
            Self::MessageReceived(_) => HookName::MessageReceived,
            Self::BeforeAgentStart(_) => HookName::BeforeAgentStart,
        }
    }
}

/// Value a subscriber returns to override downstream behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOverride {
    /// Replacement system prompt for the agent invocation.
    pub system_prompt: String,
}

pub type HookFuture = Pin<Box<dyn Future<Output = anyhow::Result<Option<HookOverride>>> + Send>>;

/// A boxed async hook subscriber.
pub type HookHandler = Arc<dyn Fn(HookEvent) -> HookFuture + Send + Sync>;
