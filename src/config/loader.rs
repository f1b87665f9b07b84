//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::WalletConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `rpc.url`.
pub const RPC_URL_ENV_VAR: &str = "WALLET_RPC_URL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<WalletConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, apply environment overrides, validate.
pub fn parse_config(content: &str) -> Result<WalletConfig, ConfigError> {
    let config: WalletConfig = toml::from_str(content)?;
    finish(config, process_env)
}

/// Built-in defaults, with the same environment overrides and validation as a file.
pub fn default_config() -> Result<WalletConfig, ConfigError> {
    finish(WalletConfig::default(), process_env)
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn finish(
    mut config: WalletConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<WalletConfig, ConfigError> {
    apply_env_overrides(&mut config, env);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut WalletConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(url) = env(RPC_URL_ENV_VAR) {
        tracing::debug!(env = RPC_URL_ENV_VAR, "Overriding rpc.url from environment");
        config.rpc.url = url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[rpc]\nchain_id = 31337\n\n[tracker]\nconfirmation_blocks = 1"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.rpc.chain_id, 31337);
        assert_eq!(config.tracker.confirmation_blocks, 1);
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[rpc\nurl = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_errors_are_collected() {
        let err = parse_config("[rpc]\nchain_id = 0\n[retries]\nmax_attempts = 0").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_defaults_take_rpc_url_override() {
        let env = |name: &str| {
            (name == RPC_URL_ENV_VAR).then(|| "http://10.0.0.5:8545".to_string())
        };
        let config = finish(WalletConfig::default(), env).unwrap();
        assert_eq!(config.rpc.url, "http://10.0.0.5:8545");
        assert_eq!(config.rpc.chain_id, WalletConfig::default().rpc.chain_id);

        let untouched = finish(WalletConfig::default(), |_: &str| None).unwrap();
        assert_eq!(untouched.rpc.url, WalletConfig::default().rpc.url);
    }

    #[test]
    fn test_bad_rpc_url_override_is_rejected() {
        let env = |name: &str| (name == RPC_URL_ENV_VAR).then(|| "not a url".to_string());
        let err = finish(WalletConfig::default(), env).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/wallet.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
