//! Process-wide configuration (§3a), distinct from the per-session
//! `session::SessionConfig`. Loaded once at startup via [`Config::load`],
//! layering built-in defaults, an optional on-disk file, and environment
//! variable overrides, following the donor's `Config::load()` layering in
//! `cli/src/config.rs` (config dir resolution, env override, `dirs`-crate
//! platform directory, `serde_json` (de)serialization) minus the donor's
//! keyring/auth/token concerns, which are out of scope here.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "termsession";

/// Process-wide configuration (§3a).
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// Directory holding session sockets and lock files.
    pub sessions_root: PathBuf,
    /// Default scrollback capacity for newly spawned VT panels (§4.1).
    pub default_scrollback: usize,
    /// Wire protocol version string, checked on HELLO (§4.2.3). Not
    /// persisted: it always tracks the running binary's version.
    #[serde(skip)]
    pub protocol_version: String,
    /// How long the server waits for a client's HELLO before dropping the
    /// connection (§4.2.3), in seconds.
    pub hello_deadline_secs: u64,
    /// How long a client waits to dial an existing session's socket before
    /// concluding the server is gone (§4.2.2), in seconds.
    pub dial_timeout_secs: u64,
}

impl Config {
    /// How long the server waits for a client's HELLO before dropping the
    /// connection (§4.2.3).
    pub fn hello_deadline(&self) -> Duration {
        Duration::from_secs(self.hello_deadline_secs)
    }

    /// How long a client waits to dial an existing session's socket (§4.2.2).
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        let sessions_root = if crate::env::is_test_mode() {
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/termsession-test/sessions")
        } else {
            dirs::home_dir()
                .map(|home| home.join(format!(".{APP_DIR}")).join("sessions"))
                .unwrap_or_else(|| PathBuf::from(format!("./.{APP_DIR}/sessions")))
        };

        Self {
            sessions_root,
            default_scrollback: crate::vt::DEFAULT_CAPACITY,
            protocol_version: crate::session::PROTOCOL_VERSION.to_string(),
            hello_deadline_secs: 5,
            dial_timeout_secs: 5,
        }
    }
}

impl Config {
    /// Returns the configuration directory, creating it if necessary.
    /// In test mode, uses a repo-local `tmp/` directory instead of the
    /// platform config dir, so unit tests never touch a real user profile.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if crate::env::is_test_mode() {
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/termsession-test/config")
        } else if let Ok(override_dir) = std::env::var("TERMSESSION_CONFIG_DIR") {
            PathBuf::from(override_dir)
        } else {
            dirs::config_dir()
                .context("could not determine platform config directory")?
                .join(APP_DIR)
        };
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Layers built-in defaults, then an on-disk file (if present), then
    /// environment-variable overrides, and ensures `sessions_root` exists.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides();
        config.protocol_version = crate::session::PROTOCOL_VERSION.to_string();
        std::fs::create_dir_all(&config.sessions_root).with_context(|| {
            format!(
                "failed to create sessions root {}",
                config.sessions_root.display()
            )
        })?;
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        let content = std::fs::read_to_string(&config_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("TERMSESSION_SESSIONS_ROOT") {
            self.sessions_root = PathBuf::from(root);
        }
        if let Ok(capacity) = std::env::var("TERMSESSION_SCROLLBACK") {
            if let Ok(parsed) = capacity.parse() {
                self.default_scrollback = parsed;
            }
        }
        if let Ok(secs) = std::env::var("TERMSESSION_HELLO_DEADLINE_SECS") {
            if let Ok(parsed) = secs.parse() {
                self.hello_deadline_secs = parsed;
            }
        }
        if let Ok(secs) = std::env::var("TERMSESSION_DIAL_TIMEOUT_SECS") {
            if let Ok(parsed) = secs.parse() {
                self.dial_timeout_secs = parsed;
            }
        }
    }

    /// Persists the current configuration to disk (owner read/write only).
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        std::fs::write(&config_path, serde_json::to_string_pretty(self)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_test_sessions_root_under_test_env() {
        let config = Config::default();
        assert!(config
            .sessions_root
            .ends_with("tmp/termsession-test/sessions"));
        assert_eq!(config.default_scrollback, crate::vt::DEFAULT_CAPACITY);
        assert_eq!(config.hello_deadline(), Duration::from_secs(5));
    }

    #[test]
    fn env_overrides_apply() {
        // SAFETY: test-only env var mutation, not run concurrently with
        // other tests that read these vars.
        unsafe {
            std::env::set_var("TERMSESSION_SESSIONS_ROOT", "/tmp/custom-sessions");
            std::env::set_var("TERMSESSION_SCROLLBACK", "42");
        }
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.sessions_root, PathBuf::from("/tmp/custom-sessions"));
        assert_eq!(config.default_scrollback, 42);
        // SAFETY: test-only env var mutation.
        unsafe {
            std::env::remove_var("TERMSESSION_SESSIONS_ROOT");
            std::env::remove_var("TERMSESSION_SCROLLBACK");
        }
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let result = Config::load();
        assert!(result.is_ok());
    }
}
