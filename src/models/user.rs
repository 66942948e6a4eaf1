use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use super::text_enum;
use crate::schema::users;

text_enum! {
    /// The sole axis of authorization.
    Role {
        Patient => "patient",
        Doctor => "doctor",
        Admin => "admin",
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = users)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub salt: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
}

impl NewUser {
    /// A self-registered account. Self-registration only ever yields patients.
    pub fn patient(email: String, password_hash: String, full_name: String, phone: Option<String>) -> Self {
        Self::with_role(Role::Patient, email, password_hash, Some(full_name), phone)
    }

    pub fn with_role(
        role: Role,
        email: String,
        password_hash: String,
        full_name: Option<String>,
        phone: Option<String>,
    ) -> Self {
        let salt = bcrypt_salt(&password_hash);
        NewUser {
            user_id: Uuid::new_v4(),
            email,
            password_hash,
            salt,
            role,
            full_name,
            phone,
            is_active: true,
        }
    }
}

// `$2b$10$` plus the 22 character salt
pub(crate) fn bcrypt_salt(hash: &str) -> String {
    hash.get(..29).unwrap_or(hash).to_string()
}

/// The public face of a user embedded in other resources.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserSummary {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Role::Doctor).unwrap(), "doctor");
    }

    #[test]
    fn self_registration_is_always_patient() {
        let user = NewUser::patient(
            "ann@example.com".into(),
            "$2b$10$abcdefghijklmnopqrstuvhashhashhash".into(),
            "Ann".into(),
            None,
        );
        assert_eq!(user.role, Role::Patient);
        assert_eq!(user.salt, "$2b$10$abcdefghijklmnopqrstuv");
        assert!(user.is_active);
    }

    #[test]
    fn secrets_are_not_serialized() {
        let user = User {
            user_id: Uuid::new_v4(),
            email: "doc@example.com".into(),
            password_hash: "hash".into(),
            salt: "salt".into(),
            role: Role::Doctor,
            full_name: Some("Dr. Doc".into()),
            phone: None,
            created_at: Utc::now(),
            last_login: None,
            is_active: true,
            reset_token: Some("token".into()),
            reset_token_expires: None,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert!(value.get("reset_token").is_none());
        assert_eq!(value["role"], "doctor");
    }
}
