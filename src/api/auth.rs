//! Authentication handling for JIRA API.
//!
//! JIRA Cloud accepts Basic Auth built from the account email and an API
//! token. The header value is computed once per client and reused for every
//! request.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Number of encoded characters shown by [`Auth::redacted`].
const REDACTED_PREFIX_LEN: usize = 8;

/// Authentication credentials for JIRA.
#[derive(Clone)]
pub struct Auth {
    /// The identity (email or username).
    identity: String,
    /// The complete "Basic ..." authorization header value.
    auth_header: String,
}

impl Auth {
    /// Create new authentication credentials from an identity and secret.
    ///
    /// The secret is immediately encoded and the raw value is not stored.
    pub fn new(identity: &str, secret: &str) -> Self {
        Self {
            identity: identity.to_string(),
            auth_header: build_auth_header(identity, secret),
        }
    }

    /// Get the authorization header value for HTTP requests.
    pub fn header_value(&self) -> &str {
        &self.auth_header
    }

    /// Get the identity this token was built for.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// A shortened form of the header that is safe to log.
    pub fn redacted(&self) -> String {
        let encoded = self
            .auth_header
            .strip_prefix("Basic ")
            .unwrap_or(&self.auth_header);
        let prefix: String = encoded.chars().take(REDACTED_PREFIX_LEN).collect();
        format!("Basic {}...", prefix)
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("identity", &self.identity)
            .field("auth_header", &self.redacted())
            .finish()
    }
}

/// Build the Basic Auth header value.
///
/// Encodes "identity:secret" in Base64 and prepends "Basic ".
pub fn build_auth_header(identity: &str, secret: &str) -> String {
    let credentials = format!("{}:{}", identity, secret);
    format!("Basic {}", BASE64.encode(credentials.as_bytes()))
}
