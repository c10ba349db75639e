use crate::client::UserCredentials;
use quillpost_common::model::{
    ImageRef, ModelValidationError,
    auth::{Authentication, PasswordHash},
    comment::{Comment, CommentText},
    post::{Post, PostTag, PostText, PostTitle},
    user::{Email, User, UserName, UserSummary},
};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub avatar_img_id: Option<String>,
    pub favorite_comments: Vec<i64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub text: String,
    pub img_url: Option<String>,
    pub img_id: Option<String>,
    pub tags: Vec<String>,
    pub comment_count: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_snowflake: i64,
    pub name: String,
    pub avatar_url: Option<String>,
    pub avatar_img_id: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_snowflake: i64,
    pub name: String,
    pub avatar_url: Option<String>,
    pub avatar_img_id: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

fn author_summary(
    user_snowflake: i64,
    name: String,
    avatar_url: Option<String>,
    avatar_img_id: Option<String>,
) -> Result<UserSummary, ModelValidationError> {
    Ok(UserSummary {
        id: user_snowflake.cast_unsigned().into(),
        name: UserName::new(name)?,
        avatar: ImageRef::from_parts(avatar_url, avatar_img_id),
    })
}

impl TryFrom<UserRecord> for UserCredentials {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: User {
                id: value.user_snowflake.cast_unsigned().into(),
                name: UserName::new(value.name)?,
                email: Email::new(value.email)?,
                avatar: ImageRef::from_parts(value.avatar_url, value.avatar_img_id),
                favorite_comments: value
                    .favorite_comments
                    .into_iter()
                    .map(|snowflake| snowflake.cast_unsigned().into())
                    .collect(),
                created_at: value.created_at,
                updated_at: value.updated_at,
            },
            password_hash: PasswordHash::new(value.password_hash)?,
        })
    }
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        UserCredentials::try_from(value).map(|credentials| credentials.user)
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.post_snowflake.cast_unsigned().into(),
            title: PostTitle::new(value.title)?,
            text: PostText::new(value.text)?,
            img: ImageRef::from_parts(value.img_url, value.img_id),
            tags: value
                .tags
                .into_iter()
                .map(PostTag::new)
                .collect::<Result<_, _>>()?,
            author: author_summary(
                value.user_snowflake,
                value.name,
                value.avatar_url,
                value.avatar_img_id,
            )?,
            comment_count: value.comment_count.try_into().unwrap_or_default(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.comment_snowflake.cast_unsigned().into(),
            post_id: value.post_snowflake.cast_unsigned().into(),
            author: author_summary(
                value.user_snowflake,
                value.name,
                value.avatar_url,
                value.avatar_img_id,
            )?,
            text: CommentText::new(value.text)?,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_snowflake.cast_unsigned().into(),
            token_hash: value.token_hash.into_boxed_slice().try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}

impl From<&Authentication> for AuthenticationRecord {
    fn from(value: &Authentication) -> Self {
        Self {
            user_snowflake: value.user.get().cast_signed(),
            token_hash: value.token_hash.0.to_vec(),
            created_at: PrimitiveDateTime::new(value.created_at.date(), value.created_at.time()),
            expires_after_seconds: value.expires_after.map(|duration| duration.whole_seconds()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::record::{AuthenticationRecord, PostRecord};
    use quillpost_common::model::{
        Id,
        auth::{AuthToken, Authentication},
        post::Post,
    };
    use quillpost_common::util::PositiveDuration;
    use time::macros::{datetime, utc_datetime};

    fn post_record() -> PostRecord {
        PostRecord {
            post_snowflake: 5,
            title: "Alpha".to_owned(),
            text: "Hello".to_owned(),
            img_url: Some("/uploads/a.png".to_owned()),
            img_id: Some("a.png".to_owned()),
            tags: vec!["go".to_owned(), "rust".to_owned()],
            comment_count: 2,
            created_at: datetime!(2025-05-01 10:00 UTC),
            updated_at: datetime!(2025-05-01 10:00 UTC),
            user_snowflake: 9,
            name: "Ada".to_owned(),
            avatar_url: None,
            avatar_img_id: None,
        }
    }

    #[test]
    fn post_record_into_post() {
        let post = Post::try_from(post_record()).unwrap();

        assert_eq!(post.id.get(), 5);
        assert_eq!(post.author.id.get(), 9);
        assert_eq!(post.comment_count, 2);
        assert!(post.has_tag("rust"));
        assert_eq!(post.img.unwrap().img_id, "a.png");
    }

    #[test]
    fn invalid_post_record_is_rejected() {
        let record = PostRecord {
            title: String::new(),
            ..post_record()
        };
        assert!(Post::try_from(record).is_err());
    }

    #[test]
    fn authentication_record_round_trip() {
        let authentication = Authentication {
            user: Id::from(3_u64),
            token_hash: AuthToken::generate_random(Id::from(3_u64)).hash().unwrap(),
            created_at: utc_datetime!(2025-05-01 10:00),
            expires_after: PositiveDuration::from_seconds(3600),
        };

        let record = AuthenticationRecord::from(&authentication);
        assert_eq!(record.expires_after_seconds, Some(3600));
        assert_eq!(Authentication::try_from(record).unwrap(), authentication);
    }
}
