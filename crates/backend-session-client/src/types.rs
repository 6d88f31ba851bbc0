//! Wire and domain types exchanged with the backend.

use client_storage::Credential;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Display name used when the identity provider supplies none.
pub const FALLBACK_DISPLAY_NAME: &str = "Google user";

/// Authenticated user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Held as a string; the backend may send a number.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(
        default,
        alias = "avatarUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar_url: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// Successful authentication: a fresh credential and the user it maps to.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub credential: Credential,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GrantBody {
    pub token: String,
    pub user: User,
}

/// Profile claims the identity provider attaches to a signed-in session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileClaims {
    /// Provider-side user id.
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

impl ProfileClaims {
    /// Provisional user built from the claims alone, for when the backend
    /// cannot be reached to confirm the identity.
    pub fn provisional_user(&self) -> User {
        User {
            id: self.uid.clone(),
            name: self
                .display_name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_string()),
            email: self.email.clone().unwrap_or_default(),
            avatar_url: self.photo_url.clone().filter(|url| !url.is_empty()),
        }
    }
}

/// Short-lived identity token plus the claims that came with it.
#[derive(Clone)]
pub struct FederatedAssertion {
    pub id_token: String,
    pub claims: ProfileClaims,
}

impl fmt::Debug for FederatedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederatedAssertion")
            .field("id_token", &"[redacted]")
            .field("claims", &self.claims)
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct FederatedLoginRequest<'a> {
    #[serde(rename = "idToken")]
    pub id_token: &'a str,
    #[serde(rename = "userData")]
    pub user_data: FederatedUserData<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FederatedUserData<'a> {
    pub name: &'a str,
    pub email: &'a str,
    #[serde(rename = "photoURL")]
    pub photo_url: &'a str,
}

impl<'a> From<&'a FederatedAssertion> for FederatedLoginRequest<'a> {
    fn from(assertion: &'a FederatedAssertion) -> Self {
        let claims = &assertion.claims;
        Self {
            id_token: &assertion.id_token,
            user_data: FederatedUserData {
                name: claims.display_name.as_deref().unwrap_or(""),
                email: claims.email.as_deref().unwrap_or(""),
                photo_url: claims.photo_url.as_deref().unwrap_or(""),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_accepts_numeric_id() {
        let user: User =
            serde_json::from_value(json!({"id": 7, "name": "Ada", "email": "ada@example.com"}))
                .unwrap();
        assert_eq!(user.id, "7");
        assert_eq!(user.avatar_url, None);
    }

    #[test]
    fn test_user_accepts_camel_case_avatar() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "name": "Ada",
            "email": "ada@example.com",
            "avatarUrl": "https://img.example.com/ada.png"
        }))
        .unwrap();
        assert_eq!(
            user.avatar_url.as_deref(),
            Some("https://img.example.com/ada.png")
        );
    }

    #[test]
    fn test_user_rejects_missing_id() {
        let result: Result<User, _> = serde_json::from_value(json!({"name": "Ada"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_provisional_user_defaults_name() {
        let claims = ProfileClaims {
            uid: "firebase-uid".into(),
            display_name: None,
            email: Some("g@example.com".into()),
            photo_url: Some(String::new()),
        };

        let user = claims.provisional_user();
        assert_eq!(user.id, "firebase-uid");
        assert_eq!(user.name, FALLBACK_DISPLAY_NAME);
        assert_eq!(user.email, "g@example.com");
        assert_eq!(user.avatar_url, None);
    }

    #[test]
    fn test_federated_request_wire_shape() {
        let assertion = FederatedAssertion {
            id_token: "idt".into(),
            claims: ProfileClaims {
                uid: "uid".into(),
                display_name: Some("Grace".into()),
                email: None,
                photo_url: Some("https://img.example.com/g.png".into()),
            },
        };

        let value = serde_json::to_value(FederatedLoginRequest::from(&assertion)).unwrap();
        assert_eq!(
            value,
            json!({
                "idToken": "idt",
                "userData": {
                    "name": "Grace",
                    "email": "",
                    "photoURL": "https://img.example.com/g.png"
                }
            })
        );
    }

    #[test]
    fn test_assertion_debug_hides_token() {
        let assertion = FederatedAssertion {
            id_token: "very-secret".into(),
            claims: ProfileClaims::default(),
        };
        assert!(!format!("{:?}", assertion).contains("very-secret"));
    }
}
