//! API keys for model providers.
//!
//! A key is wrapped in [`secrecy::SecretString`] as soon as it is read and is
//! only readable through [`ApiCredential::expose`], at the point where it is
//! attached to a request. `Debug` and `Display` print `[REDACTED]`.
//!
//! ```ignore
//! let key = ApiCredential::resolve(settings.api_key.as_deref(), OPENAI_API_KEY_ENV, "OpenAI API key")?;
//! request.bearer_auth(key.expose());
//! ```

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use super::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `provider.api_key` in the runtime config
    Config,
    Environment,
    /// Passed in by the caller
    Programmatic,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Config => "config",
            CredentialSource::Environment => "environment",
            CredentialSource::Programmatic => "caller",
        }
    }
}

pub struct ApiCredential {
    key: SecretString,
    source: CredentialSource,
    label: &'static str,
}

impl ApiCredential {
    pub fn new(key: impl Into<String>, source: CredentialSource, label: &'static str) -> Self {
        Self {
            key: SecretString::from(key.into()),
            source,
            label,
        }
    }

    pub fn from_env(env_var: &str, label: &'static str) -> Result<Self, ProviderError> {
        match std::env::var(env_var) {
            Ok(key) => Ok(Self::new(key, CredentialSource::Environment, label)),
            Err(_) => Err(ProviderError::NotConfigured(format!("{label} missing: {env_var} is not set"))),
        }
    }

    /// The configured key when it is non-blank, otherwise `env_var`.
    pub fn resolve(configured: Option<&str>, env_var: &str, label: &'static str) -> Result<Self, ProviderError> {
        match configured.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Ok(Self::new(key, CredentialSource::Config, label)),
            None => Self::from_env(env_var, label).map_err(|_| {
                ProviderError::NotConfigured(format!(
                    "{label} missing: set provider.api_key in the config or export {env_var}"
                ))
            }),
        }
    }

    /// Whether [`resolve`](Self::resolve) would find a key.
    pub fn is_available(configured: Option<&str>, env_var: &str) -> bool {
        let in_config = configured.is_some_and(|k| !k.trim().is_empty());
        in_config || std::env::var_os(env_var).is_some()
    }

    pub fn expose(&self) -> &str {
        self.key.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.label
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("label", &self.label)
            .field("source", &self.source)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [REDACTED]", self.label, self.source.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "sk-repcheck-0123456789";

    #[test]
    fn test_key_never_formatted() {
        let credential = ApiCredential::new(KEY, CredentialSource::Config, "OpenAI API key");

        for rendered in [format!("{credential:?}"), format!("{credential}")] {
            assert!(!rendered.contains(KEY), "key leaked: {rendered}");
            assert!(rendered.contains("[REDACTED]"));
        }
        assert_eq!(credential.to_string(), "OpenAI API key (config) [REDACTED]");
        assert_eq!(credential.expose(), KEY);
    }

    #[test]
    fn test_configured_key_wins_and_is_trimmed() {
        std::env::set_var("REPCHECK_TEST_KEY_CONFIG_WINS", "from-env");
        let credential =
            ApiCredential::resolve(Some("  from-config "), "REPCHECK_TEST_KEY_CONFIG_WINS", "key").unwrap();
        assert_eq!(credential.expose(), "from-config");
        assert_eq!(credential.source(), CredentialSource::Config);
        std::env::remove_var("REPCHECK_TEST_KEY_CONFIG_WINS");
    }

    #[test]
    fn test_blank_config_uses_environment() {
        std::env::set_var("REPCHECK_TEST_KEY_BLANK_CONFIG", "from-env");
        let credential = ApiCredential::resolve(Some(""), "REPCHECK_TEST_KEY_BLANK_CONFIG", "key").unwrap();
        assert_eq!(credential.expose(), "from-env");
        assert_eq!(credential.source(), CredentialSource::Environment);
        std::env::remove_var("REPCHECK_TEST_KEY_BLANK_CONFIG");
    }

    #[test]
    fn test_missing_key_explains_both_sources() {
        let err = ApiCredential::resolve(None, "REPCHECK_TEST_KEY_UNSET", "OpenAI API key").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("provider.api_key"));
        assert!(message.contains("REPCHECK_TEST_KEY_UNSET"));
        assert!(!ApiCredential::is_available(Some(" "), "REPCHECK_TEST_KEY_UNSET"));
        assert!(ApiCredential::is_available(Some("k"), "REPCHECK_TEST_KEY_UNSET"));
    }
}
