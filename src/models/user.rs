use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::common::{empty_as_none, UserId};

/// Role flag stored on the user record; absent means `Regular`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Regular,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Regular => "regular",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Lenient parse used for stored documents: anything but `admin` is regular
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some(role) if role.eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::Regular,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User domain model. Serialized field names are the ones stored in the
/// document collection (and the spreadsheet export columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profile_image_url: Option<String>,
    pub uid: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// User for insertion. The password never reaches the document store; it is
/// only used to create the identity account.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub uid: Option<String>,
    pub profile_image_url: Option<String>,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role: Role::Regular,
            uid: None,
            profile_image_url: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }
}

/// Partial update: `None` leaves the stored field untouched.
/// `profile_image_url: Some(None)` clears the avatar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub profile_image_url: Option<Option<String>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none() && self.profile_image_url.is_none()
    }
}

/// Admin panel form for creating a user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserForm {
    #[validate(length(min = 1, max = 255, message = "El nombre debe tener entre 1 y 255 caracteres"))]
    pub name: String,

    #[validate(email(message = "El correo electrónico no es válido"))]
    pub email: String,

    /// When present an identity account is created as well
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(min = 6, message = "La contraseña debe tener al menos 6 caracteres"))]
    pub password: Option<String>,

    #[serde(default)]
    pub role: Option<Role>,
}

/// Admin panel form for editing a user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EditUserForm {
    #[validate(length(min = 1, max = 255, message = "El nombre debe tener entre 1 y 255 caracteres"))]
    pub name: String,

    #[validate(email(message = "El correo electrónico no es válido"))]
    pub email: String,

    #[serde(default)]
    pub role: Option<Role>,
}

impl From<EditUserForm> for UserChanges {
    fn from(form: EditUserForm) -> Self {
        Self {
            name: Some(form.name),
            email: Some(form.email),
            role: form.role,
            profile_image_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serializes_with_stored_field_names() {
        let user = User {
            id: "a1".to_string(),
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            role: Role::Admin,
            profile_image_url: None,
            uid: Some("uid-1".to_string()),
        };

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["role"], "admin");
        assert_eq!(value["profileImageUrl"], serde_json::Value::Null);
        assert_eq!(value["uid"], "uid-1");
    }

    #[test]
    fn test_role_from_stored_is_lenient() {
        assert_eq!(Role::from_stored(Some("ADMIN")), Role::Admin);
        assert_eq!(Role::from_stored(Some("editor")), Role::Regular);
        assert_eq!(Role::from_stored(None), Role::Regular);
    }

    #[test]
    fn test_create_form_treats_blank_password_as_absent() {
        let form: CreateUserForm = serde_json::from_value(serde_json::json!({
            "name": "Ana",
            "email": "ana@x.com",
            "password": "",
            "role": "admin"
        }))
        .unwrap();

        assert_eq!(form.password, None);
        assert_eq!(form.role, Some(Role::Admin));
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_create_form_rejects_short_password() {
        let form: CreateUserForm = serde_json::from_value(serde_json::json!({
            "name": "Ana",
            "email": "ana@x.com",
            "password": "abc"
        }))
        .unwrap();
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_edit_form_becomes_partial_changes() {
        let form = EditUserForm {
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            role: None,
        };

        let changes = UserChanges::from(form);
        assert_eq!(changes.role, None);
        assert_eq!(changes.profile_image_url, None);
        assert!(!changes.is_empty());
    }
}
