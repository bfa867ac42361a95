//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Credential files default to the directory holding the config file, so
//! one config per deployment keeps its sessions apart.

use serde::Deserialize;
use session_auth::AuthConfig;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "session-cli.toml";
const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";
const DEFAULT_PENDING_FILE: &str = "pending-login.json";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub callback: CallbackConfig,
}

/// Where the credential bundle and the in-flight login live
#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// Durable credential bundle. Relative paths resolve against the config file.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
    /// PKCE verifier between `login` and `callback`. Removed once consumed.
    #[serde(default)]
    pub pending_path: Option<PathBuf>,
}

/// Local listener for `login --listen`
#[derive(Debug, Deserialize)]
pub struct CallbackConfig {
    #[serde(default = "default_callback_timeout")]
    pub timeout_secs: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_callback_timeout(),
        }
    }
}

fn default_callback_timeout() -> u64 {
    300
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// `TZ` fills in `auth.timezone` when the file leaves it out.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        config
            .auth
            .validate()
            .map_err(|e| common::Error::Config(e.to_string()))?;

        if config.callback.timeout_secs == 0 {
            return Err(common::Error::Config(
                "callback timeout_secs must be greater than 0".into(),
            ));
        }

        if config.auth.timezone.is_none()
            && let Ok(tz) = std::env::var("TZ")
        {
            let tz = tz.trim().trim_start_matches(':').to_owned();
            if !tz.is_empty() {
                config.auth.timezone = Some(tz);
            }
        }

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let storage = &mut config.storage;
        storage.credentials_path = Some(resolve_against(
            base,
            storage.credentials_path.take(),
            DEFAULT_CREDENTIALS_FILE,
        ));
        storage.pending_path = Some(resolve_against(
            base,
            storage.pending_path.take(),
            DEFAULT_PENDING_FILE,
        ));

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    pub fn credentials_path(&self) -> &Path {
        self.storage
            .credentials_path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CREDENTIALS_FILE))
    }

    pub fn pending_path(&self) -> &Path {
        self.storage
            .pending_path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_PENDING_FILE))
    }
}

fn resolve_against(base: &Path, configured: Option<PathBuf>, default: &str) -> PathBuf {
    match configured {
        Some(p) if p.is_absolute() => p,
        Some(p) => base.join(p),
        None => base.join(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_auth::SessionStrategy;
    use std::sync::Mutex;

    /// Serializes tests that touch TZ or CONFIG_PATH.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn valid_toml() -> &'static str {
        r#"
[auth]
provider_url = "https://auth.example.com"
client_id = "client-123"
origin = "http://127.0.0.1:8765"
api_base = "https://api.example.com"
"#
    }

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("session-cli.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("TZ") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), valid_toml());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.auth.client_id, "client-123");
        assert_eq!(config.auth.strategy, SessionStrategy::Pkce);
        assert_eq!(config.auth.scopes, "openid email profile");
        assert_eq!(config.auth.key_label, "Web UI");
        assert!(config.auth.timezone.is_none());
        assert_eq!(config.callback.timeout_secs, 300);
        assert_eq!(
            config.credentials_path(),
            dir.path().join("credentials.json")
        );
        assert_eq!(config.pending_path(), dir.path().join("pending-login.json"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/session-cli.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "not valid {{{{ toml");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_brokered_strategy_and_storage_paths() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
[auth]
provider_url = "https://auth.example.com"
client_id = "client-123"
origin = "https://app.example.com"
api_base = "https://app.example.com"
strategy = "brokered"
identity_provider = "Google"
timezone = "Europe/Berlin"

[storage]
credentials_path = "state/creds.json"
pending_path = "/var/tmp/pending.json"

[callback]
timeout_secs = 30
"#,
        );

        unsafe { set_env("TZ", "America/Chicago") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env("TZ") };

        assert_eq!(config.auth.strategy, SessionStrategy::Brokered);
        assert_eq!(config.auth.identity_provider.as_deref(), Some("Google"));
        // The file wins over TZ.
        assert_eq!(config.auth.timezone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(config.callback.timeout_secs, 30);
        assert_eq!(
            config.credentials_path(),
            dir.path().join("state/creds.json")
        );
        assert_eq!(config.pending_path(), Path::new("/var/tmp/pending.json"));
    }

    #[test]
    fn test_timezone_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), valid_toml());

        unsafe { set_env("TZ", ":America/Chicago") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env("TZ") };

        assert_eq!(config.auth.timezone.as_deref(), Some("America/Chicago"));
    }

    #[test]
    fn test_rejects_non_http_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
[auth]
provider_url = "https://auth.example.com"
client_id = "client-123"
origin = "app.example.com"
api_base = "https://api.example.com"
"#,
        );

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("origin"), "got: {err}");
    }

    #[test]
    fn test_rejects_zero_callback_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            &format!("{}\n[callback]\ntimeout_secs = 0\n", valid_toml()),
        );

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"), "got: {err}");
    }

    #[test]
    fn test_resolve_path_precedence() {
        let _lock = ENV_MUTEX.lock().unwrap();

        unsafe { set_env("CONFIG_PATH", "/etc/session-cli/env.toml") };
        assert_eq!(
            Config::resolve_path(Some(Path::new("/tmp/cli.toml"))),
            PathBuf::from("/tmp/cli.toml")
        );
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("/etc/session-cli/env.toml")
        );

        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("session-cli.toml")
        );
    }
}
