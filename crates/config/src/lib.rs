//! Configuration: schema types, file discovery/loading, env substitution.
//!
//! Config is resolved once at process start and treated as immutable for the
//! process lifetime.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{clear_config_dir, discover_and_load, load_config, set_config_dir},
    schema::{AuthMode, BindMode, DoormanConfig, GatewayConfig, GoogleAuthConfig},
};
