use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Access token issued by the WAGRI authorization service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Username to password table for inbound Basic authentication.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct BasicAuthUsers(HashMap<String, String>);

impl BasicAuthUsers {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn verify(&self, user: &str, password: Option<&str>) -> bool {
        match (self.0.get(user), password) {
            (Some(expected), Some(given)) => constant_time_eq(expected.as_bytes(), given.as_bytes()),
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

impl<const N: usize> From<[(&str, &str); N]> for BasicAuthUsers {
    fn from(users: [(&str, &str); N]) -> Self {
        Self(
            users
                .into_iter()
                .map(|(user, password)| (user.to_string(), password.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_file_is_a_flat_object() {
        let users = BasicAuthUsers::from_json(r#"{"farmer": "s3cret", "lab": "pw"}"#).unwrap();
        assert!(users.verify("farmer", Some("s3cret")));
        assert!(!users.verify("farmer", Some("wrong")));
        assert!(!users.verify("farmer", None));
        assert!(!users.verify("bad_user", Some("password")));
    }

    #[test]
    fn password_comparison_checks_every_byte() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"s3cret", b"s3cret!"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));

        let users = BasicAuthUsers::from([("farmer", "s3cret")]);
        assert!(!users.verify("farmer", Some("")));
        assert!(!users.verify("farmer", Some("s3cre")));
    }

    #[test]
    fn token_response_deserializes() {
        let credential: Credential = serde_json::from_str(
            r#"{"access_token": "abc", "token_type": "bearer", "expires_in": 3599}"#,
        )
        .unwrap();
        assert_eq!(credential.access_token, "abc");
        assert_eq!(credential.expires_in, 3599);
    }
}
