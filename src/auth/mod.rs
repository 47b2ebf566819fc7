/*!
 * # Administrator Authentication
 *
 * Login payloads exchanged with `/auth/login` and the session context that
 * owns the bearer token for every later admin call.
 *
 * The backend issues the token; this crate only stores it, attaches it, and
 * drops it when the server answers 401.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

pub mod session;

pub use session::{
    FileSessionStore, LogoutNotice, MemorySessionStore, Session, SessionContext, SessionStore,
};

/// Credentials posted to `/auth/login`.
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 100, message = "กรุณากรอกชื่อผู้ใช้"))]
    pub username: String,
    #[validate(length(min = 1, message = "กรุณากรอกรหัสผ่าน"))]
    pub password: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into().trim().to_string(),
            password: password.into(),
        }
    }
}

// Keep passwords out of logs and panic messages
impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Identity of the logged-in administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    #[serde(
        default,
        rename = "_id",
        alias = "id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl AdminUser {
    /// Name for the greeting line; "Admin" when no full name is on record.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Admin")
    }
}

/// Body of a successful login. Not wrapped in the usual `data` envelope.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub admin: AdminUser,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("token", &"<redacted>")
            .field("admin", &self.admin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_credentials_fail_validation() {
        let request = LoginRequest::new("  ", "");
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let request = LoginRequest::new("admin", "hunter2");
        assert!(!format!("{request:?}").contains("hunter2"));
    }

    #[test]
    fn display_name_falls_back_to_admin() {
        let admin: AdminUser = serde_json::from_str(r#"{"_id":"1","username":"root"}"#).unwrap();
        assert_eq!(admin.display_name(), "Admin");

        let named = AdminUser {
            full_name: Some("Somsak P.".into()),
            ..admin
        };
        assert_eq!(named.display_name(), "Somsak P.");
    }
}
