use crate::model::{
    Id, ImageRef, InvalidFieldError, bounded_text, comment::CommentMarker,
    deserialize_image_change,
};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use time::OffsetDateTime;

pub const USER_NAME_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 128;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id<UserMarker>,
    pub name: UserName,
    pub email: Email,
    pub avatar: Option<ImageRef>,
    pub favorite_comments: Vec<Id<CommentMarker>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The public face of a user, embedded in posts and comments.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Id<UserMarker>,
    pub name: UserName,
    pub avatar: Option<ImageRef>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct CreateUser {
    pub name: UserName,
    pub email: Email,
    pub password: Password,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct LoginUser {
    pub email: Email,
    pub password: String,
}

/// A profile edit. Absent fields stay as they are; `"avatar": null` removes the photo.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct UpdateProfile {
    #[serde(default)]
    pub name: Option<UserName>,
    #[serde(default, deserialize_with = "deserialize_image_change")]
    pub avatar: Option<Option<ImageRef>>,
}

impl UpdateProfile {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.avatar.is_none()
    }
}

validated_string!(UserName);

impl UserName {
    pub fn new(name: String) -> Result<Self, InvalidFieldError> {
        bounded_text("name", &name, 1, USER_NAME_MAX_LEN).map(Self)
    }
}

validated_string!(
    /// A trimmed, lower-cased email address.
    Email
);

impl Email {
    pub fn new(email: String) -> Result<Self, InvalidFieldError> {
        let email = email.trim().to_lowercase();

        if email.chars().count() > EMAIL_MAX_LEN {
            return Err(InvalidFieldError::new(
                "email",
                format!("must be at most {EMAIL_MAX_LEN} characters long"),
            ));
        }
        if email.chars().any(char::is_whitespace) {
            return Err(InvalidFieldError::new("email", "must not contain whitespace"));
        }

        match email.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(email))
            }
            _ => Err(InvalidFieldError::new(
                "email",
                "must have the form name@domain",
            )),
        }
    }
}

/// A plain text password as submitted on registration. Never serialized.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Result<Self, InvalidFieldError> {
        let len = password.chars().count();
        if (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
            Ok(Self(password))
        } else {
            Err(InvalidFieldError::new(
                "password",
                format!(
                    "must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters long"
                ),
            ))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Password::new(inner).map_err(serde::de::Error::custom)
    }
}
