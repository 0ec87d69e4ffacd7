//! Credentials for the private client variant.
//!
//! The session provider that issues tokens lives outside this crate; it only
//! needs to hand the current access token to a [`TokenSource`].

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// Supplies the bearer token for each outgoing request.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    fn access_token(&self) -> Option<String> {
        (**self).access_token()
    }
}

/// Token holder updated by the session layer after login, refresh or logout.
pub struct SessionToken {
    token: ArcSwapOption<String>,
}

impl SessionToken {
    pub fn new() -> Self {
        Self {
            token: ArcSwapOption::empty(),
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.set(token);
        session
    }

    pub fn set(&self, token: impl Into<String>) {
        self.token.store(Some(Arc::new(token.into())));
    }

    pub fn clear(&self) {
        self.token.store(None);
    }

    pub fn is_present(&self) -> bool {
        self.token.load().is_some()
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSource for SessionToken {
    fn access_token(&self) -> Option<String> {
        self.token.load_full().map(|t| t.as_ref().clone())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("present", &self.is_present())
            .finish()
    }
}

/// A fixed token, e.g. a service credential passed on the command line.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

/// Which client variant a transport represents.
#[derive(Clone)]
pub enum Access {
    /// Anonymous: no bearer token, no cookie jar.
    Public,
    /// Bearer token per request plus a cookie jar for the backend session.
    Private(Arc<dyn TokenSource>),
}

impl Access {
    pub fn is_private(&self) -> bool {
        matches!(self, Access::Private(_))
    }
}

impl fmt::Debug for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public => f.write_str("Public"),
            Access::Private(_) => f.write_str("Private"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_lifecycle() {
        let session = SessionToken::new();
        assert_eq!(session.access_token(), None);

        session.set("abc");
        assert_eq!(session.access_token().as_deref(), Some("abc"));

        session.set("def");
        assert_eq!(session.access_token().as_deref(), Some("def"));

        session.clear();
        assert!(!session.is_present());
    }

    #[test]
    fn test_debug_never_prints_token() {
        let session = SessionToken::with_token("secret-token");
        assert!(!format!("{:?}", session).contains("secret-token"));
        assert!(!format!("{:?}", StaticToken::new("secret-token")).contains("secret-token"));
    }

    #[test]
    fn test_shared_source() {
        let session = Arc::new(SessionToken::with_token("t"));
        let access = Access::Private(session.clone());
        assert!(access.is_private());
        session.clear();
        if let Access::Private(source) = access {
            assert_eq!(source.access_token(), None);
        }
    }
}
