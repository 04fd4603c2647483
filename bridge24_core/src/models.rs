use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A locally stored CRM contact.
///
/// Email is the natural key: no two contacts may share an email,
/// compared case-insensitively. Name fields are free text and may be
/// absent (remote records frequently omit them).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// "{name} {last_name}" with missing parts dropped, trimmed.
    pub fn full_name(&self) -> String {
        let name = self.name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{name} {last}").trim().to_string()
    }
}

/// Candidate contact before it gets an id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

/// A registered account that can authenticate against the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub profile: UserProfile,
}

/// Optional profile attributes attached to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// Durable record backing a `b24_<uuid>.<secret>` bearer token.
///
/// Only the SHA-256 hash of the secret is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub token_id: Uuid,
    pub user_id: Uuid,
    pub secret_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(name: Option<&str>, last: Option<&str>) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            name: name.map(str::to_string),
            last_name: last.map(str::to_string),
            email: "jo@x.com".to_string(),
            phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn full_name_joins_and_trims() {
        assert_eq!(contact(Some("Jo"), Some("Do")).full_name(), "Jo Do");
        assert_eq!(contact(Some("Jo"), None).full_name(), "Jo");
        assert_eq!(contact(None, Some("Do")).full_name(), "Do");
        assert_eq!(contact(None, None).full_name(), "");
    }
}
