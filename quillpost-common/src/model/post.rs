use crate::model::{
    Id, ImageRef, InvalidFieldError, bounded_text, deserialize_image,
    user::UserSummary,
};
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

pub const POST_TITLE_MAX_LEN: usize = 39;
pub const POST_TEXT_MAX_LEN: usize = 50_000;
pub const POST_TAG_MAX_LEN: usize = 32;
pub const POST_TAGS_MAX_COUNT: usize = 16;

const TAG_FORBIDDEN_START: &str = "!@#$%^&*()_";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: PostTitle,
    pub text: PostText,
    pub img: Option<ImageRef>,
    pub tags: Vec<PostTag>,
    pub author: UserSummary,
    pub comment_count: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Post {
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|post_tag| post_tag.get() == tag)
    }
}

/// The editable part of a post, as sent on create and update.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub title: PostTitle,
    pub text: PostText,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<PostTag>,
    #[serde(default, deserialize_with = "deserialize_image")]
    pub img: Option<ImageRef>,
}

validated_string!(PostTitle);

impl PostTitle {
    pub fn new(title: String) -> Result<Self, InvalidFieldError> {
        bounded_text("title", &title, 1, POST_TITLE_MAX_LEN).map(Self)
    }
}

validated_string!(PostText);

impl PostText {
    pub fn new(text: String) -> Result<Self, InvalidFieldError> {
        bounded_text("text", &text, 1, POST_TEXT_MAX_LEN).map(Self)
    }
}

validated_string!(
    /// A free-form label. Casing is kept as entered and matching is exact.
    PostTag
);

impl PostTag {
    pub fn new(tag: String) -> Result<Self, InvalidFieldError> {
        let tag = bounded_text("tag", &tag, 1, POST_TAG_MAX_LEN)?;

        if let Some(first) = tag.chars().next()
            && (first.is_ascii_digit() || TAG_FORBIDDEN_START.contains(first))
        {
            return Err(InvalidFieldError::new(
                "tag",
                format!("must not start with '{first}'"),
            ));
        }
        if tag.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(InvalidFieldError::new("tag", "must be a single word"));
        }

        Ok(Self(tag))
    }
}

/// Drops repeated tags, keeping the first occurrence and the original order.
#[must_use]
pub fn dedup_tags(tags: Vec<PostTag>) -> Vec<PostTag> {
    let mut unique = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<PostTag>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = dedup_tags(Vec::<PostTag>::deserialize(deserializer)?);
    if tags.len() > POST_TAGS_MAX_COUNT {
        return Err(serde::de::Error::custom(InvalidFieldError::new(
            "tags",
            format!("at most {POST_TAGS_MAX_COUNT} tags are allowed"),
        )));
    }
    Ok(tags)
}
