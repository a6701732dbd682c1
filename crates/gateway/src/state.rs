use std::sync::Arc;

use doorman_extensions::ExtensionHost;

use crate::auth::ResolvedAuth;

/// Shared gateway runtime state, wrapped in Arc for use across async tasks.
pub struct GatewayState {
    /// Server version string.
    pub version: String,
    /// Auth configuration.
    pub auth: ResolvedAuth,
    /// Extension registries (routes, commands, hooks).
    pub host: Arc<ExtensionHost>,
}

impl GatewayState {
    pub fn new(auth: ResolvedAuth, host: Arc<ExtensionHost>) -> Arc<Self> {
        Arc::new(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            auth,
            host,
        })
    }
}
