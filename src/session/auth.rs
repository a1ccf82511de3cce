//! Login state machine for the implicit-grant OAuth flow.
//!
//! `LoggedOut -> Authenticating -> LoggedIn -> LoggedOut`. The browser part of
//! the flow happens elsewhere; this module builds the authorization URL and
//! consumes the redirect the browser lands on.

use std::collections::HashMap;

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Serialize;
use url::Url;

use crate::config::Config;
use crate::error::{OsfError, Result};
use crate::session::session::{Session, Token, now_secs};

/// Token lifetime assumed when the server does not say.
const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Observable login state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    LoggedOut,
    Authenticating,
    LoggedIn,
}

#[derive(Debug)]
enum AuthState {
    LoggedOut,
    Authenticating { csrf: String },
    LoggedIn(Session),
}

/// Owner of the single active [`Session`].
#[derive(Debug)]
pub struct AuthManager {
    client_id: String,
    redirect_uri: String,
    scope: String,
    accounts_url: String,
    state: AuthState,
}

impl AuthManager {
    pub fn new(config: &Config) -> Self {
        Self {
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
            accounts_url: config.accounts_url.clone(),
            state: AuthState::LoggedOut,
        }
    }

    pub fn status(&self) -> AuthStatus {
        match self.state {
            AuthState::LoggedOut => AuthStatus::LoggedOut,
            AuthState::Authenticating { .. } => AuthStatus::Authenticating,
            AuthState::LoggedIn(_) => AuthStatus::LoggedIn,
        }
    }

    /// The current session, or an anonymous one when not logged in.
    pub fn session(&self) -> Session {
        match &self.state {
            AuthState::LoggedIn(session) => session.clone(),
            _ => Session::anonymous(),
        }
    }

    /// Start a login and return the URL to open in a browser.
    ///
    /// An active session is dropped: only one session exists at a time.
    pub fn begin_login(&mut self) -> Result<Url> {
        if self.client_id.is_empty() || self.redirect_uri.is_empty() {
            return Err(OsfError::InvalidState(
                "client_id and redirect_uri must be configured to log in".to_string(),
            ));
        }

        let csrf: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();

        let base = if self.accounts_url.ends_with('/') {
            Url::parse(&self.accounts_url)?
        } else {
            Url::parse(&format!("{}/", self.accounts_url))?
        };
        let mut url = base.join("oauth2/authorize")?;
        url.query_pairs_mut()
            .append_pair("response_type", "token")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scope)
            .append_pair("state", &csrf);

        if matches!(self.state, AuthState::LoggedIn(_)) {
            tracing::info!("new login replaces the active session");
        }
        self.state = AuthState::Authenticating { csrf };
        Ok(url)
    }

    /// Finish a login with the URL the browser was redirected to.
    ///
    /// Any failure (denied access, forged state, missing token) returns the
    /// manager to `LoggedOut`.
    pub fn complete_login(&mut self, redirect_url: &str) -> Result<Session> {
        let AuthState::Authenticating { csrf } = &self.state else {
            return Err(OsfError::InvalidState("no login in progress".to_string()));
        };

        match parse_redirect(redirect_url, &self.redirect_uri, csrf) {
            Ok(token) => {
                let session = Session::new(token);
                self.state = AuthState::LoggedIn(session.clone());
                tracing::info!("login completed");
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "login failed");
                self.state = AuthState::LoggedOut;
                Err(e)
            }
        }
    }

    /// Abort a login in progress.
    pub fn cancel_login(&mut self) {
        if matches!(self.state, AuthState::Authenticating { .. }) {
            self.state = AuthState::LoggedOut;
        }
    }

    /// Enter `LoggedIn` with a previously stored token.
    pub fn restore(&mut self, token: Token) -> Result<Session> {
        if token.is_expired() {
            return Err(OsfError::Unauthenticated);
        }
        let session = Session::new(token);
        self.state = AuthState::LoggedIn(session.clone());
        Ok(session)
    }

    /// Drop the session. Returns it if one was active.
    pub fn logout(&mut self) -> Option<Session> {
        match std::mem::replace(&mut self.state, AuthState::LoggedOut) {
            AuthState::LoggedIn(session) => Some(session),
            _ => None,
        }
    }

    /// Forced logout after the server rejected the token.
    pub fn invalidate(&mut self) -> Option<Session> {
        self.logout().map(|mut session| {
            session.invalidate();
            session
        })
    }
}

/// Extract the token from the redirect fragment.
fn parse_redirect(redirect_url: &str, expected_prefix: &str, csrf: &str) -> Result<Token> {
    if !redirect_url.starts_with(expected_prefix) {
        return Err(OsfError::LoginFailed(format!(
            "unexpected redirect target {}",
            redirect_url
        )));
    }

    let url = Url::parse(redirect_url)?;
    // Errors may arrive in the query when the server refuses early.
    let raw = url.fragment().or(url.query()).unwrap_or("");
    let params: HashMap<String, String> = url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect();

    if let Some(error) = params.get("error") {
        let detail = params.get("error_description").unwrap_or(error);
        return Err(OsfError::LoginFailed(detail.clone()));
    }

    if params.get("state").map(String::as_str) != Some(csrf) {
        return Err(OsfError::LoginFailed("state mismatch".to_string()));
    }

    let access_token = params
        .get("access_token")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| OsfError::LoginFailed("no access token in redirect".to_string()))?;

    let expires_in = params
        .get("expires_in")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_EXPIRES_IN);

    Ok(Token {
        access_token: access_token.clone(),
        token_type: params
            .get("token_type")
            .cloned()
            .unwrap_or_else(|| "Bearer".to_string()),
        scope: params.get("scope").cloned(),
        expires_in: Some(expires_in),
        expires_at: now_secs() + expires_in as f64,
    })
}
