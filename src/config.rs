// src/config.rs
//
// TOML configuration for the calculator. Every section is optional; command
// line flags and environment variables take precedence over file values.

use crate::connectors::defiscan::DEFISCAN_BLOCKS_URL;
use crate::connectors::kucoin::{KucoinCredentials, KUCOIN_API_URL, KUCOIN_SANDBOX_URL};
use crate::error::{LottoError, Result};
use crate::locator::DEFAULT_MAX_STEPS;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_API_KEY: &str = "KUCOIN_API_KEY";
pub const ENV_API_SECRET: &str = "KUCOIN_API_SECRET";
pub const ENV_API_PASSWORD: &str = "KUCOIN_API_PASSWORD";

const DEFAULT_LOG_FILE: &str = "lotto_calc.log";

// =============================================================================
// Configuration Types
// =============================================================================

/// Root configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub kucoin: KucoinConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub locator: LocatorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// KuCoin account and endpoint settings.
#[derive(Debug, Default, Deserialize)]
pub struct KucoinConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_password: Option<String>,
    /// Production REST endpoint
    pub base_url: Option<String>,
    /// Sandbox REST endpoint, used in debug mode
    pub sandbox_url: Option<String>,
}

/// Block explorer settings.
#[derive(Debug, Default, Deserialize)]
pub struct ExplorerConfig {
    /// Block page prefix; the block id is appended
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocatorConfig {
    /// Maximum backward steps before giving up
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

/// Result log settings.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default)]
    pub log_disabled: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            log_disabled: false,
        }
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

/// Credentials given on the command line, if any.
#[derive(Debug, Default, Clone)]
pub struct CredentialOverrides {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_password: Option<String>,
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            LottoError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)
            .map_err(|e| LottoError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.locator.max_steps == 0 {
            return Err(LottoError::Configuration(
                "locator.max_steps must be at least 1".to_string(),
            ));
        }
        for url in [
            &self.kucoin.base_url,
            &self.kucoin.sandbox_url,
            &self.explorer.base_url,
        ]
        .into_iter()
        .flatten()
        {
            url::Url::parse(url)
                .map_err(|e| LottoError::Configuration(format!("invalid URL '{}': {}", url, e)))?;
        }
        Ok(())
    }

    /// KuCoin REST endpoint for the selected mode.
    pub fn kucoin_url(&self, debug: bool) -> &str {
        if debug {
            self.kucoin.sandbox_url.as_deref().unwrap_or(KUCOIN_SANDBOX_URL)
        } else {
            self.kucoin.base_url.as_deref().unwrap_or(KUCOIN_API_URL)
        }
    }

    pub fn explorer_url(&self) -> &str {
        self.explorer.base_url.as_deref().unwrap_or(DEFISCAN_BLOCKS_URL)
    }

    /// Resolves credentials from the command line, then the environment,
    /// then this file.
    pub fn credentials(&self, overrides: &CredentialOverrides) -> Result<KucoinCredentials> {
        self.credentials_with(overrides, |name| std::env::var(name).ok())
    }

    /// Same as [`Config::credentials`] with an explicit environment lookup.
    pub fn credentials_with<F>(&self, overrides: &CredentialOverrides, env: F) -> Result<KucoinCredentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |flag: &Option<String>, var: &str, file: &Option<String>, name: &str| {
            flag.clone()
                .or_else(|| env(var))
                .or_else(|| file.clone())
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    LottoError::Configuration(format!(
                        "KuCoin {} is not set (use --{}, {} or kucoin.{})",
                        name,
                        name.replace('_', "-"),
                        var,
                        name
                    ))
                })
        };

        Ok(KucoinCredentials {
            api_key: resolve(&overrides.api_key, ENV_API_KEY, &self.kucoin.api_key, "api_key")?,
            api_secret: resolve(
                &overrides.api_secret,
                ENV_API_SECRET,
                &self.kucoin.api_secret,
                "api_secret",
            )?,
            api_password: resolve(
                &overrides.api_password,
                ENV_API_PASSWORD,
                &self.kucoin.api_password,
                "api_password",
            )?,
        })
    }
}

// =============================================================================
// Default Configuration
// =============================================================================

/// Returns a default configuration string for documentation.
pub fn default_config_template() -> &'static str {
    r#"# DFI Community Lottery Calculator Configuration

[kucoin]
# Account credentials. May also be given with --api-key/--api-secret/--api-password
# or the KUCOIN_API_KEY / KUCOIN_API_SECRET / KUCOIN_API_PASSWORD variables.
api_key = ""
api_secret = ""
api_password = ""
# base_url = "https://api.kucoin.com"
# sandbox_url = "https://openapi-sandbox.kucoin.com"

[explorer]
# base_url = "https://defiscan.live/blocks/"

[locator]
# Give up after this many backward steps
max_steps = 5000

[output]
# Result records are appended here, header first
log_file = "lotto_calc.log"
log_disabled = false
"#
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_basic_config() {
        let config = Config::from_str(
            r#"
            [kucoin]
            api_key = "key-from-file"
            api_secret = "secret-from-file"
            api_password = "pass-from-file"

            [locator]
            max_steps = 120

            [output]
            log_file = "/tmp/draws.log"
        "#,
        )
        .unwrap();

        assert_eq!(config.kucoin.api_key.as_deref(), Some("key-from-file"));
        assert_eq!(config.locator.max_steps, 120);
        assert_eq!(config.output.log_file, PathBuf::from("/tmp/draws.log"));
        assert!(!config.output.log_disabled);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.locator.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.output.log_file, PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(config.kucoin_url(false), KUCOIN_API_URL);
        assert_eq!(config.kucoin_url(true), KUCOIN_SANDBOX_URL);
        assert_eq!(config.explorer_url(), DEFISCAN_BLOCKS_URL);
    }

    #[test]
    fn test_template_parses() {
        let config = Config::from_str(default_config_template()).unwrap();
        assert_eq!(config.locator.max_steps, 5000);
    }

    #[test]
    fn test_rejects_zero_max_steps() {
        let err = Config::from_str("[locator]\nmax_steps = 0").unwrap_err();
        assert!(matches!(err, LottoError::Configuration(_)));
    }

    #[test]
    fn test_rejects_bad_url() {
        let err = Config::from_str("[explorer]\nbase_url = \"not a url\"").unwrap_err();
        assert!(matches!(err, LottoError::Configuration(_)));
    }

    #[test]
    fn test_credentials_precedence() {
        let config = Config::from_str(
            r#"
            [kucoin]
            api_key = "file-key"
            api_secret = "file-secret"
            api_password = "file-pass"
        "#,
        )
        .unwrap();
        let overrides = CredentialOverrides {
            api_key: Some("cli-key".to_string()),
            ..Default::default()
        };
        let env = |name: &str| (name == ENV_API_SECRET).then(|| "env-secret".to_string());

        let creds = config.credentials_with(&overrides, env).unwrap();
        assert_eq!(creds.api_key, "cli-key");
        assert_eq!(creds.api_secret, "env-secret");
        assert_eq!(creds.api_password, "file-pass");
    }

    #[test]
    fn test_missing_credentials() {
        let config = Config::from_str("[kucoin]\napi_key = \"k\"\napi_secret = \"\"").unwrap();
        let err = config
            .credentials_with(&CredentialOverrides::default(), no_env)
            .unwrap_err();
        match err {
            LottoError::Configuration(msg) => assert!(msg.contains("api_secret")),
            other => panic!("Expected configuration error, got {:?}", other),
        }
    }
}
