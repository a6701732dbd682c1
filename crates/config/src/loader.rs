use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    schema::{AuthMode, BindMode, DoormanConfig},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["doorman.toml", "doorman.yaml", "doorman.yml", "doorman.json"];

/// Override for the config directory, set via `set_config_dir()`.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Set a custom config directory. When set, config discovery only looks in
/// this directory (project-local and user-global paths are skipped).
/// Can be called multiple times (e.g. in tests) — each call replaces the
/// previous override.
pub fn set_config_dir(path: PathBuf) {
    if let Ok(mut guard) = CONFIG_DIR_OVERRIDE.lock() {
        *guard = Some(path);
    }
}

/// Clear the config directory override, restoring default discovery.
pub fn clear_config_dir() {
    if let Ok(mut guard) = CONFIG_DIR_OVERRIDE.lock() {
        *guard = None;
    }
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE.lock().ok().and_then(|g| g.clone())
}

/// Load config from the given path (any supported format), with env
/// substitution and env overrides applied.
pub fn load_config(path: &Path) -> anyhow::Result<DoormanConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let mut config = parse_config(&raw, path)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./doorman.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/doorman/doorman.{toml,yaml,yml,json}` (user-global)
///
/// Returns defaults (plus env overrides) if no config file is found or the
/// file fails to parse.
pub fn discover_and_load() -> DoormanConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    let mut config = DoormanConfig::default();
    apply_env_overrides(&mut config);
    config
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<DoormanConfig> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Ok(toml::from_str(raw)?),
        Some("yaml" | "yml") => Ok(serde_yaml::from_str(raw)?),
        Some("json") => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: {}", path.display()),
    }
}

/// Environment overrides, applied after file parsing:
/// `DOORMAN_TOKEN`, `DOORMAN_AUTH` (none|token), `DOORMAN_BIND`
/// (loopback|public), `DOORMAN_PORT`.
fn apply_env_overrides(config: &mut DoormanConfig) {
    if let Ok(v) = std::env::var("DOORMAN_TOKEN")
        && !v.is_empty()
    {
        config.gateway.token = Some(v);
    }
    if let Ok(v) = std::env::var("DOORMAN_AUTH") {
        match v.as_str() {
            "none" => config.gateway.auth_mode = AuthMode::None,
            "token" => config.gateway.auth_mode = AuthMode::Token,
            other => warn!(value = other, "unknown DOORMAN_AUTH value, ignoring"),
        }
    }
    if let Ok(v) = std::env::var("DOORMAN_BIND") {
        match v.as_str() {
            "loopback" => config.gateway.bind_mode = BindMode::Loopback,
            "public" => config.gateway.bind_mode = BindMode::Public,
            other => warn!(value = other, "unknown DOORMAN_BIND value, ignoring"),
        }
    }
    if let Ok(v) = std::env::var("DOORMAN_PORT")
        && let Ok(port) = v.parse()
    {
        config.gateway.port = port;
    }
}

/// Find the first config file in standard locations.
///
/// When a config dir override is set, only that directory is searched —
/// project-local and user-global paths are skipped for isolation.
fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        for name in CONFIG_FILENAMES {
            let p = dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
        // Override is set — don't fall through to other locations.
        return None;
    }

    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/doorman/
    if let Some(dir) = home_dir().map(|h| h.join(".config").join("doorman")) {
        for name in CONFIG_FILENAMES {
            let p = dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

fn home_dir() -> Option<PathBuf> {
    directories::UserDirs::new().map(|u| u.home_dir().to_path_buf())
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    #[test]
    fn loads_toml_from_override_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("doorman.toml"),
            "[gateway]\nauth_mode = \"token\"\ntoken = \"shh\"\nport = 4242\n",
        )
        .unwrap();
        set_config_dir(dir.path().to_path_buf());

        let cfg = discover_and_load();
        clear_config_dir();

        assert_eq!(cfg.gateway.port, 4242);
        assert_eq!(cfg.gateway.token.as_deref(), Some("shh"));
    }

    #[test]
    fn env_substitution_in_file() {
        unsafe { std::env::set_var("DOORMAN_LOADER_TEST_SECRET", "s3cret") };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doorman.toml");
        std::fs::write(
            &path,
            "[google_auth]\nclient_id = \"abc\"\nclient_secret = \"${DOORMAN_LOADER_TEST_SECRET}\"\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        unsafe { std::env::remove_var("DOORMAN_LOADER_TEST_SECRET") };

        assert_eq!(cfg.google_auth.client_secret.as_deref(), Some("s3cret"));
        assert!(cfg.google_auth.enforcement_enabled());
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doorman.ini");
        std::fs::write(&path, "nope").unwrap();
        assert!(load_config(&path).is_err());
    }
}
