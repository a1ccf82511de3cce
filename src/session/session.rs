//! Access token and the session built around it.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{OsfError, Result};

/// OAuth access token as handed out by the accounts server.
///
/// Stored on disk as JSON with `expires_at` in Unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Unix time after which the token is no longer accepted
    pub expires_at: f64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

pub(crate) fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl Token {
    /// Create a token valid for `expires_in` seconds from now.
    pub fn new(access_token: impl Into<String>, expires_in: u64) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            scope: None,
            expires_in: Some(expires_in),
            expires_at: now_secs() + expires_in as f64,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= now_secs()
    }

    /// Write the token to `path`, replacing any previous file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a stored token. Returns `Ok(None)` if the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        let token = serde_json::from_str(&text)
            .map_err(|e| OsfError::ParseError(format!("token file {}: {}", path.display(), e)))?;
        Ok(Some(token))
    }

    /// Remove a stored token file if present.
    pub fn remove_file<P: AsRef<Path>>(path: P) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Authenticated context passed explicitly to every API call.
///
/// A session without a token, with an expired token, or one that has been
/// invalidated refuses to hand out credentials.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Option<Token>,
    invalidated: bool,
}

impl Session {
    /// A session with no credentials; every API call fails with `Unauthenticated`.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(token: Token) -> Self {
        Self {
            token: Some(token),
            invalidated: false,
        }
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        !self.invalidated && self.token.as_ref().is_some_and(|t| !t.is_expired())
    }

    /// Mark the token unusable, e.g. after the server rejected it.
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// The bearer credential for a request, or `Unauthenticated`.
    pub fn bearer(&self) -> Result<&str> {
        match &self.token {
            Some(token) if self.is_valid() => Ok(&token.access_token),
            _ => Err(OsfError::Unauthenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_session_has_no_bearer() {
        let session = Session::anonymous();
        assert!(!session.is_valid());
        assert!(matches!(session.bearer(), Err(OsfError::Unauthenticated)));
    }

    #[test]
    fn test_valid_session() {
        let session = Session::new(Token::new("tok", 3600));
        assert!(session.is_valid());
        assert_eq!(session.bearer().unwrap(), "tok");
    }

    #[test]
    fn test_expired_and_invalidated_sessions() {
        let mut expired = Token::new("old", 0);
        expired.expires_at -= 10.0;
        assert!(expired.is_expired());
        assert!(Session::new(expired).bearer().is_err());

        let mut session = Session::new(Token::new("tok", 3600));
        session.invalidate();
        assert!(matches!(session.bearer(), Err(OsfError::Unauthenticated)));
    }

    #[test]
    fn test_token_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");

        assert!(Token::load(&path).unwrap().is_none());

        let token = Token::new("abc", 3600);
        token.save(&path).unwrap();
        assert_eq!(Token::load(&path).unwrap(), Some(token));

        Token::remove_file(&path).unwrap();
        assert!(!path.exists());
        // Removing twice is fine.
        Token::remove_file(&path).unwrap();
    }

    #[test]
    fn test_token_file_from_oauthlib() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(
            &path,
            r#"{"access_token": "xyz", "token_type": "Bearer", "expires_in": "3600",
                "expires_at": 1458120000.5, "scope": ["osf.full_write"]}"#,
        )
        .unwrap();

        // Foreign shapes for expires_in/scope are rejected rather than guessed.
        assert!(matches!(Token::load(&path), Err(OsfError::ParseError(_))));

        std::fs::write(
            &path,
            r#"{"access_token": "xyz", "expires_at": 1458120000.5}"#,
        )
        .unwrap();
        let token = Token::load(&path).unwrap().unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert!(token.is_expired());
    }

    #[test]
    fn test_corrupt_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Token::load(&path), Err(OsfError::ParseError(_))));
    }
}
