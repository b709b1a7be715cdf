//! The authenticated principal as returned by `/api/auth/me/`.

use serde::{Deserialize, Serialize};

/// Read-only projection of the logged-in user.
///
/// The server speaks Portuguese field names (`nome`, `telefone`); they are
/// mapped to English names here and kept on the wire through serde renames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    #[serde(rename = "nome", default)]
    pub name: String,
    #[serde(rename = "telefone", default)]
    pub phone: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl SessionUser {
    /// Name to show in the UI, falling back to the email when the profile
    /// has no name filled in.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_me_response() {
        let json = r#"{"id": "7f0c2a1e-2b9c-4d43-9a57-0d3d5c1b8e11", "email": "ana@piscinas.com.br", "nome": "Ana Souza", "telefone": "+55 11 91234-5678", "is_active": true}"#;
        let user: SessionUser = serde_json::from_str(json).expect("Failed to parse me response");
        assert_eq!(user.id, "7f0c2a1e-2b9c-4d43-9a57-0d3d5c1b8e11");
        assert_eq!(user.email, "ana@piscinas.com.br");
        assert_eq!(user.name, "Ana Souza");
        assert_eq!(user.phone, "+55 11 91234-5678");
        assert!(user.is_active);
        assert_eq!(user.display_name(), "Ana Souza");
    }

    #[test]
    fn test_missing_optional_fields() {
        let json = r#"{"id": "1", "email": "a@b.com"}"#;
        let user: SessionUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.name, "");
        assert_eq!(user.phone, "");
        assert!(user.is_active);
        assert_eq!(user.display_name(), "a@b.com");
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let user = SessionUser {
            id: "1".into(),
            email: "a@b.com".into(),
            name: "A".into(),
            phone: "".into(),
            is_active: false,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["nome"], "A");
        assert_eq!(value["is_active"], false);
        assert!(value.get("name").is_none());
    }
}
