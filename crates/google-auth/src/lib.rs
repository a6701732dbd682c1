//! Google access gate: an extension that binds a messaging-channel identity
//! (chat id) to a verified Google identity (email) and gates agent access on
//! a per-channel basis.
//!
//! Flow: `/login` command → user opens the login route → redirect to Google
//! with a single-use state token → provider callback → code exchange →
//! identity table write → the `before_agent_start` hook stops overriding the
//! system prompt for that channel.
//!
//! All state is in-memory: a process restart means users re-authenticate.

pub mod exchange;
pub mod extension;
pub mod identity;
pub mod pages;
pub mod store;

pub use {
    exchange::{ExchangeError, GoogleExchange, IdClaims, decode_id_token},
    extension::{GoogleAuthExtension, channel_id_from_session_key},
    identity::IdentityTable,
    store::{PendingAuth, PendingAuthStore},
};
