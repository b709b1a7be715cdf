//! Opaque token types exchanged with the auth endpoints.
//!
//! Neither type exposes its value through `Debug`, so they can sit inside
//! structs that end up in log output.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Short-lived bearer credential authorizing business API calls.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessCredential(String);

impl AccessCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessCredential(<redacted>)")
    }
}

impl From<String> for AccessCredential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for AccessCredential {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Anti-forgery token read back from the `csrftoken` cookie.
/// Lives only for the duration of one protected call sequence.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let access = AccessCredential::new("secret-jwt");
        let csrf = CsrfToken::new("csrf-A");
        assert!(!format!("{:?}", access).contains("secret-jwt"));
        assert!(!format!("{:?}", csrf).contains("csrf-A"));
    }

    #[test]
    fn test_bearer_value() {
        assert_eq!(AccessCredential::from("T2").bearer(), "Bearer T2");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let access = AccessCredential::new("T1");
        assert_eq!(serde_json::to_string(&access).unwrap(), r#""T1""#);
        let back: AccessCredential = serde_json::from_str(r#""T1""#).unwrap();
        assert_eq!(back, access);
    }
}
