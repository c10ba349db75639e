use crate::{
    model::{
        Id, InvalidFieldError,
        user::{Password, User, UserMarker},
    },
    util::PositiveDuration,
};
use argon2::{
    Argon2, Params, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::UtcDateTime;

pub const AUTH_TOKEN_CORE_LEN: usize = 24;
pub const AUTH_TOKEN_SALT_LEN: usize = 18;
pub const AUTH_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;
pub const PASSWORD_SALT_LEN: usize = 16;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing auth token failed: {0}")]
pub struct AuthTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum AuthTokenDecodeError {
    #[error("Not enough parts separated by ':'")]
    NotEnoughParts,
    #[error("Invalid user id: {0}")]
    InvalidUserId(ParseIntError),
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The length of the core part is incorrect")]
    InvalidCoreLength,
    #[error("The length of the salt part is incorrect")]
    InvalidSaltLength,
}

/// A bearer token: `{user_id}:{base64 core}:{base64 salt}`.
///
/// Only the argon2 hash of the core (salted with the salt part) is ever stored.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthToken {
    pub user_id: Id<UserMarker>,
    pub core: [u8; AUTH_TOKEN_CORE_LEN],
    pub salt: [u8; AUTH_TOKEN_SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthTokenHash(pub Box<[u8; AUTH_TOKEN_HASH_LEN]>);

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Authentication {
    pub user: Id<UserMarker>,
    pub token_hash: AuthTokenHash,
    pub created_at: UtcDateTime,
    pub expires_after: Option<PositiveDuration>,
}

impl Authentication {
    #[must_use]
    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        self.expires_after
            .is_some_and(|expires_after| self.created_at + expires_after.get() < now)
    }
}

/// What register and login hand back: the user and a fresh bearer token.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

impl AuthToken {
    #[must_use]
    pub fn generate_random(user_id: Id<UserMarker>) -> Self {
        let core = rand::random();
        let salt = rand::random();

        Self {
            user_id,
            core,
            salt,
        }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        let user_id = self.user_id;
        let encoded_core = Base64Display::new(&self.core, &BASE64_STANDARD);
        let encoded_salt = Base64Display::new(&self.salt, &BASE64_STANDARD);

        format!("{user_id}:{encoded_core}:{encoded_salt}")
    }

    pub fn hash(&self) -> Result<AuthTokenHash, AuthTokenHashError> {
        let argon2 = Argon2::default();

        let mut hash = Box::new([0; AUTH_TOKEN_HASH_LEN]);
        argon2
            .hash_password_into(&self.core, &self.salt, &mut *hash)
            .map_err(AuthTokenHashError)?;

        Ok(AuthTokenHash(hash))
    }
}

impl FromStr for AuthToken {
    type Err = AuthTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');

        let user_id_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let core_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let salt_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;

        let user_id = user_id_part.parse().map_err(Self::Err::InvalidUserId)?;
        let core = BASE64_STANDARD
            .decode(core_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidCoreLength)?;
        let salt = BASE64_STANDARD
            .decode(salt_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSaltLength)?;

        Ok(Self {
            user_id,
            core,
            salt,
        })
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("user_id", &self.user_id)
            .field("core", &"[redacted]")
            .field("salt", &"[redacted]")
            .finish()
    }
}

impl Debug for AuthTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthTokenHash").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The auth token hash had an invalid length")]
pub struct InvalidAuthTokenHashError;

impl TryFrom<Box<[u8]>> for AuthTokenHash {
    type Error = InvalidAuthTokenHashError;

    fn try_from(value: Box<[u8]>) -> Result<Self, Self::Error> {
        Ok(Self(
            value.try_into().map_err(|_| InvalidAuthTokenHashError)?,
        ))
    }
}

/// An argon2 password hash in PHC string format.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(phc: String) -> Result<Self, InvalidFieldError> {
        argon2::PasswordHash::new(&phc)
            .map_err(|err| InvalidFieldError::new("password hash", err.to_string()))?;
        Ok(Self(phc))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        argon2::PasswordHash::new(&self.0).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    }
}

impl Debug for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordHash").field(&"[redacted]").finish()
    }
}

impl Password {
    pub fn hash(&self) -> Result<PasswordHash, PasswordHashError> {
        let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

        let phc = Argon2::default()
            .hash_password(self.get().as_bytes(), &salt)
            .map_err(PasswordHashError)?
            .to_string();

        Ok(PasswordHash(phc))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{
            Id,
            auth::{AuthToken, AuthTokenDecodeError, Authentication, PasswordHash},
            user::Password,
        },
        util::PositiveDuration,
    };
    use time::{Duration, macros::utc_datetime};

    #[test]
    fn token_round_trips_through_str() {
        let token = AuthToken::generate_random(Id::from(77_u64));
        let parsed: AuthToken = token.as_token_str().parse().unwrap();

        assert_eq!(parsed, token);
        assert_eq!(parsed.hash().unwrap(), token.hash().unwrap());
    }

    #[test]
    fn malformed_tokens() {
        assert_eq!(
            "77".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::NotEnoughParts)
        );
        assert!(matches!(
            "abc:AAAA:AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidUserId(_))
        ));
        assert_eq!(
            "77:AAAA:AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidCoreLength)
        );
    }

    #[test]
    fn different_tokens_hash_differently() {
        let first = AuthToken::generate_random(Id::from(1_u64));
        let second = AuthToken::generate_random(Id::from(1_u64));
        assert_ne!(first.hash().unwrap(), second.hash().unwrap());
    }

    #[test]
    fn authentication_expiry() {
        let created_at = utc_datetime!(2025-06-01 12:00);
        let token_hash = AuthToken::generate_random(Id::from(1_u64)).hash().unwrap();
        let authentication = Authentication {
            user: Id::from(1_u64),
            token_hash,
            created_at,
            expires_after: PositiveDuration::from_seconds(60),
        };

        assert!(!authentication.is_expired_at(created_at + Duration::seconds(59)));
        assert!(authentication.is_expired_at(created_at + Duration::seconds(61)));

        let forever = Authentication {
            expires_after: None,
            ..authentication
        };
        assert!(!forever.is_expired_at(created_at + Duration::days(10_000)));
    }

    #[test]
    fn password_hash_verifies() {
        let password = Password::new("correct horse".to_owned()).unwrap();
        let hash = password.hash().unwrap();

        assert!(hash.verify("correct horse"));
        assert!(!hash.verify("wrong horse"));
        assert_eq!(PasswordHash::new(hash.get().to_owned()).unwrap(), hash);
        assert!(PasswordHash::new("plain".to_owned()).is_err());
    }
}
