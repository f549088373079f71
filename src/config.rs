//! Runtime configuration: provider settings and API credentials.
//!
//! Settings come from an optional YAML file; any key left out keeps its
//! default. Credentials come from the environment (via the CLI) first and fall
//! back to one-line key files in the config directory.
//!
//! ```yaml
//! search_endpoint: https://api.newscatcherapi.com/v2/search
//! completion_endpoint: https://api.openai.com
//! model: text-davinci-003
//! max_tokens: 50
//! request_timeout_secs: 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::ConfigError;
use crate::{api, sources};

pub const NEWSCATCHER_KEY_ENV: &str = "NEWSCATCHER_API_KEY";
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
pub const NEWSCATCHER_KEY_FILE: &str = "newscatcher_API_apiKey.txt";
pub const OPENAI_KEY_FILE: &str = "openai_apiKey.txt";

/// Provider endpoints and request limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub search_endpoint: String,
    pub completion_endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_endpoint: sources::newscatcher::DEFAULT_ENDPOINT.to_string(),
            completion_endpoint: api::DEFAULT_ENDPOINT.to_string(),
            model: api::DEFAULT_MODEL.to_string(),
            max_tokens: api::DEFAULT_MAX_TOKENS,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            debug!("No settings file; using defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_yaml(&raw).map_err(|source| ConfigError::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn search_url(&self) -> Result<Url, ConfigError> {
        parse_endpoint(&self.search_endpoint)
    }

    pub fn completion_url(&self) -> Result<Url, ConfigError> {
        parse_endpoint(&self.completion_endpoint)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_endpoint(value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::Endpoint {
        value: value.to_string(),
        source,
    })
}

/// API keys for both providers.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub newscatcher: String,
    pub openai: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("newscatcher", &"<redacted>")
            .field("openai", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Resolve both keys. `newscatcher`/`openai` are the values already read
    /// from the environment or the command line; missing ones are read from
    /// `config_dir`.
    #[instrument(level = "info", skip(newscatcher, openai))]
    pub fn resolve(
        newscatcher: Option<String>,
        openai: Option<String>,
        config_dir: &Path,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            newscatcher: resolve_key(
                "NewsCatcher API key",
                newscatcher,
                NEWSCATCHER_KEY_ENV,
                &config_dir.join(NEWSCATCHER_KEY_FILE),
            )?,
            openai: resolve_key(
                "OpenAI API key",
                openai,
                OPENAI_KEY_ENV,
                &config_dir.join(OPENAI_KEY_FILE),
            )?,
        })
    }
}

fn resolve_key(
    name: &'static str,
    given: Option<String>,
    env: &'static str,
    file: &Path,
) -> Result<String, ConfigError> {
    if let Some(key) = given.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
        debug!(name, "Using key from environment");
        return Ok(key);
    }

    let missing = || ConfigError::MissingCredential {
        name,
        env,
        file: PathBuf::from(file),
    };
    if !file.exists() {
        return Err(missing());
    }
    let key = std::fs::read_to_string(file)
        .map_err(|source| ConfigError::Read {
            path: file.to_path_buf(),
            source,
        })?
        .trim()
        .to_string();
    if key.is_empty() {
        return Err(missing());
    }
    debug!(name, file = %file.display(), "Using key from file");
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.search_endpoint, "https://api.newscatcherapi.com/v2/search");
        assert_eq!(settings.model, "text-davinci-003");
        assert_eq!(settings.max_tokens, 50);
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_settings_partial_yaml() {
        let settings = Settings::from_yaml("model: gpt-3.5-turbo-instruct\nmax_tokens: 5\n").unwrap();
        assert_eq!(settings.model, "gpt-3.5-turbo-instruct");
        assert_eq!(settings.max_tokens, 5);
        assert_eq!(settings.completion_endpoint, "https://api.openai.com");
        assert_eq!(Settings::from_yaml("").unwrap(), Settings::default());
    }

    #[test]
    fn test_settings_rejects_unknown_keys() {
        assert!(Settings::from_yaml("modle: typo\n").is_err());
    }

    #[test]
    fn test_settings_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "max_tokens: [1, 2]\n").unwrap();
        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Settings { .. }));
        assert!(err.to_string().contains("settings.yaml"));
    }

    #[test]
    fn test_bad_endpoint() {
        let settings = Settings {
            completion_endpoint: "not a url".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.completion_url(),
            Err(ConfigError::Endpoint { .. })
        ));
        assert!(settings.search_url().is_ok());
    }

    #[test]
    fn test_credentials_prefer_given_values() {
        let dir = tempfile::tempdir().unwrap();
        let creds =
            Credentials::resolve(Some("news".into()), Some(" sk-1 \n".into()), dir.path()).unwrap();
        assert_eq!(creds.newscatcher, "news");
        assert_eq!(creds.openai, "sk-1");
        assert!(!format!("{creds:?}").contains("sk-1"));
    }

    #[test]
    fn test_credentials_fall_back_to_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(NEWSCATCHER_KEY_FILE), "file-news\n").unwrap();
        fs::write(dir.path().join(OPENAI_KEY_FILE), "file-openai").unwrap();
        let creds = Credentials::resolve(None, Some("".into()), dir.path()).unwrap();
        assert_eq!(creds.newscatcher, "file-news");
        assert_eq!(creds.openai, "file-openai");
    }

    #[test]
    fn test_credentials_missing_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(NEWSCATCHER_KEY_FILE), "  \n").unwrap();
        let err = Credentials::resolve(None, Some("sk".into()), dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingCredential { env: NEWSCATCHER_KEY_ENV, .. }
        ));

        let err = Credentials::resolve(Some("n".into()), None, dir.path()).unwrap_err();
        assert!(err.to_string().contains(OPENAI_KEY_ENV));
    }
}
