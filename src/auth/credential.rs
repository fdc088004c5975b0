//! Session credentials
//!
//! The engine treats the access token as an opaque bearer string.

use std::fmt;

use crate::error::AppError;

/// Logged-in session: the server it belongs to and its bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Server the session was opened against (e.g. "mastodon.social")
    pub origin_server: String,
    pub access_token: String,
}

impl Credential {
    pub fn new(origin_server: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            origin_server: origin_server.into(),
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("origin_server", &self.origin_server)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Supplies the credential of the current session
pub trait CredentialProvider: Send + Sync {
    fn credential(&self) -> Result<Credential, AppError>;
}

/// Provider serving one fixed credential (from configuration)
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credential: Option<Credential>,
}

impl StaticCredentialProvider {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: Some(credential),
        }
    }

    /// Provider with no logged-in session
    pub fn empty() -> Self {
        Self { credential: None }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn credential(&self) -> Result<Credential, AppError> {
        self.credential
            .clone()
            .ok_or_else(|| AppError::Config("no access token configured for account".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_token() {
        let credential = Credential::new("mastodon.social", "secret-token");
        let rendered = format!("{:?}", credential);

        assert!(rendered.contains("mastodon.social"));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn empty_provider_reports_missing_session() {
        let provider = StaticCredentialProvider::empty();
        assert!(matches!(provider.credential(), Err(AppError::Config(_))));

        let provider = StaticCredentialProvider::new(Credential::new("a.example", "t"));
        assert_eq!(provider.credential().unwrap().origin_server, "a.example");
    }
}
