use serde::{Deserialize, Deserializer, Serialize};

/// Declares a `String` newtype whose only constructor is a validating `new`,
/// with `Deserialize` routed through that constructor.
macro_rules! validated_string {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn get(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let inner = <String as serde::Deserialize>::deserialize(deserializer)?;
                $name::new(inner).map_err(serde::de::Error::custom)
            }
        }
    };
}

pub mod auth;
pub mod comment;
pub mod post;
pub mod user;

use crate::{
    model::auth::InvalidAuthTokenHashError,
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
    util::NonPositiveDurationError,
};
use std::{fmt::Display, marker::PhantomData, num::ParseIntError, str::FromStr};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Field(#[from] InvalidFieldError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("Invalid {field}: {reason}")]
pub struct InvalidFieldError {
    pub field: &'static str,
    pub reason: String,
}

impl InvalidFieldError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Trimmed copy of `value` whose length in chars lies in `min..=max`.
pub(crate) fn bounded_text(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<String, InvalidFieldError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min {
        Err(InvalidFieldError::new(
            field,
            format!("must be at least {min} characters long"),
        ))
    } else if len > max {
        Err(InvalidFieldError::new(
            field,
            format!("must be at most {max} characters long"),
        ))
    } else {
        Ok(trimmed.to_owned())
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct QuillpostEpoch;
impl Epoch for QuillpostEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type QuillpostSnowflake = Snowflake<QuillpostEpoch>;
pub type QuillpostSnowflakeGenerator = SnowflakeGenerator<QuillpostEpoch>;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(QuillpostSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: QuillpostSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> QuillpostSnowflake {
        self.0
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str(s).map(Id::from)
    }
}

impl<Marker> From<QuillpostSnowflake> for Id<Marker> {
    fn from(value: QuillpostSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for QuillpostSnowflake {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(QuillpostSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.get()
    }
}

/// Body of every error reply.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

/// A stored image as handed out by the media store.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub url: String,
    #[serde(default)]
    pub img_id: String,
}

impl ImageRef {
    /// `None` when `url` is empty, which is how clients spell "no image".
    #[must_use]
    pub fn from_parts(url: Option<String>, img_id: Option<String>) -> Option<Self> {
        url.filter(|url| !url.is_empty()).map(|url| Self {
            url,
            img_id: img_id.unwrap_or_default(),
        })
    }
}

/// Deserializes an optional image, mapping `{"url": ""}` to `None`.
pub(crate) fn deserialize_image<'de, D>(deserializer: D) -> Result<Option<ImageRef>, D::Error>
where
    D: Deserializer<'de>,
{
    let image = Option::<ImageRef>::deserialize(deserializer)?;
    Ok(image.filter(|image| !image.url.is_empty()))
}

/// Like [`deserialize_image`], but keeps "field absent" apart from "field null".
/// Use with `#[serde(default)]`.
pub(crate) fn deserialize_image_change<'de, D>(
    deserializer: D,
) -> Result<Option<Option<ImageRef>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_image(deserializer).map(Some)
}
