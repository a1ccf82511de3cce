//! Client configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{OsfError, Result};

/// Default OSF API root.
pub const DEFAULT_API_URL: &str = "https://api.osf.io/v2/";
/// Default OSF accounts (OAuth) server.
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.osf.io/";
/// Scope needed for browsing, uploading and deleting.
pub const DEFAULT_SCOPE: &str = "osf.full_write";

/// Settings for the API client, the auth manager and the explorer actor.
///
/// Can be built in code, read from a JSON file, or from `OSF_*` environment
/// variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub accounts_url: String,
    /// OAuth client id registered at the OSF
    pub client_id: String,
    /// Redirect URI registered for `client_id`
    pub redirect_uri: String,
    pub scope: String,
    /// Where the access token is kept between runs. `None` disables persistence.
    pub token_file: Option<PathBuf>,
    pub proxy: Option<String>,
    /// Buffer size of the event channel
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            client_id: String::new(),
            redirect_uri: String::new(),
            scope: DEFAULT_SCOPE.to_string(),
            token_file: None,
            proxy: None,
            event_capacity: 256,
        }
    }
}

impl Config {
    /// Create a configuration for a registered OAuth application.
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            ..Self::default()
        }
    }

    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Read a JSON configuration file. Missing keys take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Build a configuration from `OSF_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(v) = lookup("OSF_API_URL") {
            config.api_url = v;
        }
        if let Some(v) = lookup("OSF_ACCOUNTS_URL") {
            config.accounts_url = v;
        }
        if let Some(v) = lookup("OSF_CLIENT_ID") {
            config.client_id = v;
        }
        if let Some(v) = lookup("OSF_REDIRECT_URI") {
            config.redirect_uri = v;
        }
        if let Some(v) = lookup("OSF_SCOPE") {
            config.scope = v;
        }
        config.token_file = lookup("OSF_TOKEN_FILE").map(PathBuf::from);
        config.proxy = lookup("OSF_PROXY");
        config
    }

    /// API root as a URL with a trailing slash, ready for `join`.
    pub fn api_base(&self) -> Result<Url> {
        base_url(&self.api_url)
    }

    pub fn accounts_base(&self) -> Result<Url> {
        base_url(&self.accounts_url)
    }

    /// Listing of the logged-in user's projects, used until the user
    /// document provides the exact link.
    pub fn projects_url(&self) -> Result<String> {
        Ok(self.api_base()?.join("users/me/nodes/")?.to_string())
    }

    /// Check that the settings needed for an interactive login are present.
    pub fn validate_oauth(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(OsfError::InvalidState("client_id is not configured".to_string()));
        }
        if self.redirect_uri.is_empty() {
            return Err(OsfError::InvalidState(
                "redirect_uri is not configured".to_string(),
            ));
        }
        Url::parse(&self.redirect_uri)?;
        Ok(())
    }
}

fn base_url(raw: &str) -> Result<Url> {
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{}/", raw))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.scope, "osf.full_write");
        assert!(config.token_file.is_none());
        assert_eq!(
            config.projects_url().unwrap(),
            "https://api.osf.io/v2/users/me/nodes/"
        );
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = Config::default().with_api_url("https://api.test.osf.io/v2");
        assert_eq!(config.api_base().unwrap().as_str(), "https://api.test.osf.io/v2/");
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("OSF_CLIENT_ID", "abc"),
            ("OSF_REDIRECT_URI", "http://localhost/cb"),
            ("OSF_TOKEN_FILE", "/tmp/osf_token.json"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.client_id, "abc");
        assert_eq!(config.redirect_uri, "http://localhost/cb");
        assert_eq!(
            config.token_file.as_deref(),
            Some(Path::new("/tmp/osf_token.json"))
        );
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.validate_oauth().is_ok());
    }

    #[test]
    fn test_validate_oauth_requires_client() {
        assert!(matches!(
            Config::default().validate_oauth(),
            Err(OsfError::InvalidState(_))
        ));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("osf.json");
        std::fs::write(&path, r#"{"client_id": "xyz", "event_capacity": 8}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.client_id, "xyz");
        assert_eq!(config.event_capacity, 8);
        assert_eq!(config.accounts_url, DEFAULT_ACCOUNTS_URL);
    }
}
