use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Payload for `POST /register`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

impl Registration {
    pub fn new(name: &str, email: &str, password: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirmation: password.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_confirms_password() {
        let reg = Registration::new("Ana", "a@b.com", "secret1");
        let json = serde_json::to_value(&reg).unwrap();
        assert_eq!(json["password"], "secret1");
        assert_eq!(json["password_confirmation"], "secret1");
    }

    #[test]
    fn test_user_tolerates_missing_timestamps() {
        let user: User =
            serde_json::from_str(r#"{"id": 7, "name": "Ana", "email": "a@b.com"}"#).unwrap();
        assert_eq!(user.id, 7);
        assert!(user.created_at.is_none());
    }
}
