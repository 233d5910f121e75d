//! Auth token injection.
//!
//! The token is passed in explicitly so tests can supply fakes; nothing here
//! reads ambient storage except [`EnvToken`], which is opt-in.

use std::fmt;

/// Synchronous source of the bearer token and user identity.
pub trait TokenSource: Send + Sync {
    /// Current bearer token, if signed in.
    fn token(&self) -> Option<String>;

    /// User id attached to analytics events.
    fn user_id(&self) -> Option<String> {
        None
    }
}

/// A fixed token, typically from a login response or a test.
#[derive(Clone, Default)]
pub struct StaticToken {
    token: Option<String>,
    user_id: Option<String>,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            user_id: None,
        }
    }

    /// No token; requests go out unauthenticated.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticToken")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }

    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

/// Reads `NEXTPLAY_AUTH_TOKEN` and `NEXTPLAY_USER_ID` on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvToken;

impl TokenSource for EnvToken {
    fn token(&self) -> Option<String> {
        std::env::var("NEXTPLAY_AUTH_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
    }

    fn user_id(&self) -> Option<String> {
        std::env::var("NEXTPLAY_USER_ID").ok().filter(|u| !u.is_empty())
    }
}
