use crate::model::{
    Id, InvalidFieldError, bounded_text,
    post::PostMarker,
    user::UserSummary,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const COMMENT_TEXT_MAX_LEN: usize = 2000;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post_id: Id<PostMarker>,
    pub author: UserSummary,
    pub text: CommentText,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CommentContent {
    pub text: CommentText,
}

validated_string!(CommentText);

impl CommentText {
    pub fn new(text: String) -> Result<Self, InvalidFieldError> {
        bounded_text("comment", &text, 1, COMMENT_TEXT_MAX_LEN).map(Self)
    }
}
