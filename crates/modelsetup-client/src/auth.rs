//! API session token handling.
//!
//! The API authenticates with a session token carried in a request header.
//! The default header is `Authorization` with the `Bearer` scheme; any other
//! header name carries the raw token.

use reqwest::RequestBuilder;

/// Default header used to carry the session token.
pub const DEFAULT_TOKEN_HEADER: &str = "Authorization";

/// Session token state for one client handle.
///
/// The [`Debug`] impl redacts tokens to keep them out of log output.
#[derive(Clone)]
pub struct ApiAuth {
    token: Option<String>,
    token_header: String,
    /// Tokens saved by [`ApiAuth::push_token`], restored by [`ApiAuth::pop_token`].
    token_stack: Vec<Option<String>>,
}

impl std::fmt::Debug for ApiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiAuth")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("token_header", &self.token_header)
            .field("stacked", &self.token_stack.len())
            .finish()
    }
}

impl Default for ApiAuth {
    fn default() -> Self {
        Self::new(None, DEFAULT_TOKEN_HEADER)
    }
}

impl ApiAuth {
    /// Create token state with an optional initial token.
    #[must_use]
    pub fn new(token: Option<String>, token_header: impl Into<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
            token_header: token_header.into(),
            token_stack: Vec::new(),
        }
    }

    /// Convenience constructor for bearer-token auth.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new(Some(token.into()), DEFAULT_TOKEN_HEADER)
    }

    /// The active token.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Whether a token is set.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Header the token is sent in.
    #[must_use]
    pub fn token_header(&self) -> &str {
        &self.token_header
    }

    /// Replace the active token. An empty string clears it.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token.filter(|t| !t.is_empty());
    }

    /// Make `token` active, remembering the current one.
    pub fn push_token(&mut self, token: impl Into<String>) {
        self.token_stack.push(self.token.take());
        self.set_token(Some(token.into()));
    }

    /// Restore the token that was active before the last [`ApiAuth::push_token`].
    ///
    /// Returns the token that is active afterwards. With nothing pushed, the
    /// current token is left in place.
    pub fn pop_token(&mut self) -> Option<&str> {
        if let Some(previous) = self.token_stack.pop() {
            self.token = previous;
        }
        self.token.as_deref()
    }

    /// Attach the active token, if any, to a request.
    #[must_use]
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            None => builder,
            Some(token) if self.token_header.eq_ignore_ascii_case(DEFAULT_TOKEN_HEADER) => {
                builder.bearer_auth(token)
            }
            Some(token) => builder.header(self.token_header.as_str(), token.as_str()),
        }
    }
}
