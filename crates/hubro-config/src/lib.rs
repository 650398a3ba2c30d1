//! Configuration management for the Hubro editor client.
//!
//! Parses `hubro.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.url`
//! - `server.ws_path`

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server base URL.
    pub server_url: Option<String>,
    /// Override preview debounce delay.
    pub preview_debounce_ms: Option<u64>,
    /// Override reconnect delay.
    pub reconnect_delay_ms: Option<u64>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "hubro.toml";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Content server configuration.
    pub server: ServerConfig,
    /// Editing session configuration.
    pub session: SessionConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Content server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the Hubro server (the page origin).
    pub url: String,
    /// Path of the admin WebSocket endpoint.
    pub ws_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_owned(),
            ws_path: "/admin/ws".to_owned(),
        }
    }
}

impl ServerConfig {
    /// WebSocket endpoint derived from the server URL.
    ///
    /// The scheme mirrors the page scheme (`http` → `ws`, `https` → `wss`)
    /// and the path is replaced by `ws_path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the URL cannot be parsed or uses
    /// an unsupported scheme.
    pub fn ws_url(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| ConfigError::Validation(format!("server.url is invalid: {e}")))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ConfigError::Validation(format!(
                    "server.url has unsupported scheme '{other}'"
                )));
            }
        };

        url.set_scheme(scheme).map_err(|()| {
            ConfigError::Validation(format!("server.url cannot use scheme '{scheme}'"))
        })?;
        url.set_path(&self.ws_path);
        url.set_query(None);
        url.set_fragment(None);

        Ok(url)
    }
}

/// Editing session configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time before an edited buffer is sent for preview.
    pub preview_debounce_ms: u64,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay_ms: u64,
    /// Request the document content when the session first connects.
    pub load_on_connect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            preview_debounce_ms: 300,
            reconnect_delay_ms: 5000,
            load_on_connect: true,
        }
    }
}

impl SessionConfig {
    /// Preview debounce delay as a [`Duration`].
    #[must_use]
    pub fn preview_debounce(&self) -> Duration {
        Duration::from_millis(self.preview_debounce_ms)
    }

    /// Reconnect delay as a [`Duration`].
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`server.url`").
        field: String,
        /// Error message (e.g., "${`HUBRO_URL`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `hubro.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading, allowing CLI arguments to take
    /// precedence over config file values. The merged result is validated.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(url) = &settings.server_url {
            self.server.url.clone_from(url);
        }
        if let Some(debounce) = settings.preview_debounce_ms {
            self.session.preview_debounce_ms = debounce;
        }
        if let Some(delay) = settings.reconnect_delay_ms {
            self.session.reconnect_delay_ms = delay;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_session()?;
        Ok(())
    }

    /// Validate server configuration.
    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.url, "server.url")?;
        require_http_url(&self.server.url, "server.url")?;

        if !self.server.ws_path.starts_with('/') {
            return Err(ConfigError::Validation(
                "server.ws_path must start with /".to_owned(),
            ));
        }

        self.server.ws_url().map(|_| ())
    }

    /// Validate session configuration.
    fn validate_session(&self) -> Result<(), ConfigError> {
        if self.session.preview_debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "session.preview_debounce_ms must be greater than 0".to_owned(),
            ));
        }
        // A zero delay would hammer a restarting server in a tight loop
        if self.session.reconnect_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "session.reconnect_delay_ms must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.url = expand::expand_env(&self.server.url, "server.url")?;
        self.server.ws_path = expand::expand_env(&self.server.ws_path, "server.ws_path")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.url, "http://127.0.0.1:8080");
        assert_eq!(config.server.ws_path, "/admin/ws");
        assert_eq!(config.session.preview_debounce(), Duration::from_millis(300));
        assert_eq!(config.session.reconnect_delay(), Duration::from_millis(5000));
        assert!(config.session.load_on_connect);
        assert!(config.config_path.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.url, "http://127.0.0.1:8080");
        assert_eq!(config.session.preview_debounce_ms, 300);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
url = "https://blog.example.com"
ws_path = "/editor/ws"

[session]
preview_debounce_ms = 150
reconnect_delay_ms = 2000
load_on_connect = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.url, "https://blog.example.com");
        assert_eq!(config.server.ws_path, "/editor/ws");
        assert_eq!(config.session.preview_debounce_ms, 150);
        assert_eq!(config.session.reconnect_delay_ms, 2000);
        assert!(!config.session.load_on_connect);
    }

    #[test]
    fn test_ws_url_http_becomes_ws() {
        let server = ServerConfig {
            url: "http://localhost:8080/admin/edit?p=post&idx=posts".to_owned(),
            ..Default::default()
        };
        assert_eq!(
            server.ws_url().unwrap().as_str(),
            "ws://localhost:8080/admin/ws"
        );
    }

    #[test]
    fn test_ws_url_https_becomes_wss() {
        let server = ServerConfig {
            url: "https://blog.example.com".to_owned(),
            ..Default::default()
        };
        assert_eq!(
            server.ws_url().unwrap().as_str(),
            "wss://blog.example.com/admin/ws"
        );
    }

    #[test]
    fn test_ws_url_custom_path() {
        let server = ServerConfig {
            url: "http://localhost:8080".to_owned(),
            ws_path: "/editor/socket".to_owned(),
        };
        assert_eq!(
            server.ws_url().unwrap().as_str(),
            "ws://localhost:8080/editor/socket"
        );
    }

    #[test]
    fn test_ws_url_rejects_unknown_scheme() {
        let server = ServerConfig {
            url: "ftp://localhost".to_owned(),
            ..Default::default()
        };
        let err = server.ws_url().unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn test_apply_cli_settings_server_url() {
        let mut config = Config::default();
        let overrides = CliSettings {
            server_url: Some("https://blog.example.com".to_owned()),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.server.url, "https://blog.example.com");
        assert_eq!(config.session.preview_debounce_ms, 300); // Unchanged
    }

    #[test]
    fn test_apply_cli_settings_timings() {
        let mut config = Config::default();
        let overrides = CliSettings {
            preview_debounce_ms: Some(50),
            reconnect_delay_ms: Some(1000),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.session.preview_debounce_ms, 50);
        assert_eq!(config.session.reconnect_delay_ms, 1000);
        assert_eq!(config.server.url, "http://127.0.0.1:8080"); // Unchanged
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hubro.toml");
        std::fs::write(&path, "[server]\nurl = \"http://localhost:9000\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.server.url, "http://localhost:9000");
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/hubro.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)), "got {err:?}");
    }

    #[test]
    fn test_load_applies_cli_settings_after_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hubro.toml");
        std::fs::write(&path, "[session]\npreview_debounce_ms = 500\n").unwrap();
        let overrides = CliSettings {
            preview_debounce_ms: Some(100),
            ..Default::default()
        };

        let config = Config::load(Some(&path), Some(&overrides)).unwrap();

        assert_eq!(config.session.preview_debounce_ms, 100);
    }

    #[test]
    fn test_load_rejects_invalid_cli_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hubro.toml");
        std::fs::write(&path, "").unwrap();
        let overrides = CliSettings {
            server_url: Some("localhost:8080".to_owned()),
            ..Default::default()
        };

        let err = Config::load(Some(&path), Some(&overrides)).unwrap_err();

        assert!(matches!(err, ConfigError::Validation(_)), "got {err:?}");
    }

    #[test]
    fn test_expand_env_vars_server_url() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("HUBRO_TEST_SERVER_URL", "https://blog.test.com");
        }

        let toml = r#"
[server]
url = "${HUBRO_TEST_SERVER_URL}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();

        assert_eq!(config.server.url, "https://blog.test.com");

        unsafe {
            std::env::remove_var("HUBRO_TEST_SERVER_URL");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("MISSING_VAR_HUBRO_CONFIG_TEST");
        }

        let toml = r#"
[server]
url = "${MISSING_VAR_HUBRO_CONFIG_TEST}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let err = config.expand_env_vars().unwrap_err();

        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("MISSING_VAR_HUBRO_CONFIG_TEST"));
        assert!(err.to_string().contains("server.url"));
    }

    // Validation tests

    /// Assert that validation fails with expected substrings in the error message.
    fn assert_validation_error(config: &Config, expected_substrings: &[&str]) {
        let result = config.validate();
        assert!(result.is_err(), "Expected validation to fail");
        let err = result.unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        let msg = err.to_string();
        for s in expected_substrings {
            assert!(
                msg.contains(s),
                "Expected error to contain '{s}', got: {msg}"
            );
        }
    }

    #[test]
    fn test_validate_default_config_passes() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_server_url_empty() {
        let mut config = Config::default();
        config.server.url = String::new();
        assert_validation_error(&config, &["server.url", "empty"]);
    }

    #[test]
    fn test_validate_server_url_invalid_scheme() {
        let mut config = Config::default();
        config.server.url = "ws://localhost:8080".to_owned();
        assert_validation_error(&config, &["server.url", "http"]);
    }

    #[test]
    fn test_validate_ws_path_relative() {
        let mut config = Config::default();
        config.server.ws_path = "admin/ws".to_owned();
        assert_validation_error(&config, &["ws_path", "/"]);
    }

    #[test]
    fn test_validate_debounce_zero() {
        let mut config = Config::default();
        config.session.preview_debounce_ms = 0;
        assert_validation_error(&config, &["preview_debounce_ms"]);
    }

    #[test]
    fn test_validate_reconnect_delay_zero() {
        let mut config = Config::default();
        config.session.reconnect_delay_ms = 0;
        assert_validation_error(&config, &["reconnect_delay_ms"]);
    }
}
