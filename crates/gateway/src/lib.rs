//! Gateway: the HTTP-facing process hosting extensions and lifecycle hooks.
//!
//! Request path: security headers (outermost) → panic catch → auth gate →
//! route dispatch (native routes, then extension routes by exact path).
//! Rejections happen before route dispatch; no extension handler ever sees
//! a request that failed the gate.

pub mod auth;
pub mod headers;
pub mod server;
pub mod state;
