use crate::{memory::MemoryStore, postgres};
use parking_lot::Mutex;
use quillpost_common::model::{
    Id, ModelValidationError, QuillpostSnowflakeGenerator,
    auth::{AuthTokenHash, Authentication, PasswordHash},
    comment::{Comment, CommentContent, CommentMarker},
    post::{Post, PostContent, PostMarker},
    user::{Email, UpdateProfile, User, UserMarker, UserName},
};
use quillpost_common::query::{PostListQuery, PostPage};
use quillpost_common::snowflake::{ProcessId, SnowflakeTimestampError, WorkerId};
use sqlx::{PgPool, migrate::MigrateError};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] MigrateError),
    #[error("Could not generate an id: {0}")]
    Snowflake(#[from] SnowflakeTimestampError),
    #[error("A user with this email already exists")]
    DuplicateEmail,
    #[error("Referenced {0} does not exist")]
    MissingReference(&'static str),
}

/// A user about to be stored. The password is already hashed.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewUser {
    pub name: UserName,
    pub email: Email,
    pub password_hash: PasswordHash,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: PasswordHash,
}

#[derive(Debug)]
enum Backend {
    Postgres(PgPool),
    Memory(MemoryStore),
}

/// Entry point to the store. Every operation behaves the same on both backends.
#[derive(Debug)]
pub struct DbClient {
    backend: Backend,
    snowflake_generator: Mutex<QuillpostSnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self::with_backend(Backend::Postgres(pool), worker_id, process_id)
    }

    /// A store that lives in process memory and is gone on drop.
    #[must_use]
    pub fn in_memory(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self::with_backend(Backend::Memory(MemoryStore::default()), worker_id, process_id)
    }

    fn with_backend(backend: Backend, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator =
            Mutex::new(QuillpostSnowflakeGenerator::new(worker_id, process_id));

        Self {
            backend,
            snowflake_generator,
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::migrate(pool).await,
            Backend::Memory(_) => Ok(()),
        }
    }

    fn next_id<Marker>(&self) -> Result<Id<Marker>> {
        Ok(self.snowflake_generator.lock().generate()?.into())
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        let id = self.next_id()?;
        let now = OffsetDateTime::now_utc();

        match &self.backend {
            Backend::Postgres(pool) => postgres::create_user(pool, id, user, now).await,
            Backend::Memory(store) => store.create_user(id, user, now),
        }
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::fetch_user(pool, user_id).await,
            Backend::Memory(store) => Ok(store.fetch_user(user_id)),
        }
    }

    pub async fn fetch_credentials(&self, email: &Email) -> Result<Option<UserCredentials>> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::fetch_credentials(pool, email).await,
            Backend::Memory(store) => Ok(store.fetch_credentials(email)),
        }
    }

    pub async fn update_user(
        &self,
        user_id: Id<UserMarker>,
        profile: &UpdateProfile,
    ) -> Result<Option<User>> {
        let now = OffsetDateTime::now_utc();

        match &self.backend {
            Backend::Postgres(pool) => postgres::update_user(pool, user_id, profile, now).await,
            Backend::Memory(store) => Ok(store.update_user(user_id, profile, now)),
        }
    }

    /// Adds or removes a favorite. `None` if the comment does not exist.
    pub async fn set_favorite_comment(
        &self,
        user_id: Id<UserMarker>,
        comment_id: Id<CommentMarker>,
        favorite: bool,
    ) -> Result<Option<User>> {
        match &self.backend {
            Backend::Postgres(pool) => {
                postgres::set_favorite_comment(pool, user_id, comment_id, favorite).await
            }
            Backend::Memory(store) => Ok(store.set_favorite_comment(user_id, comment_id, favorite)),
        }
    }

    pub async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::create_auth(pool, authentication).await,
            Backend::Memory(store) => store.create_auth(authentication),
        }
    }

    pub async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::fetch_auth(pool, token_hash).await,
            Backend::Memory(store) => Ok(store.fetch_auth(token_hash)),
        }
    }

    /// Returns whether a token was revoked.
    pub async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::delete_auth(pool, token_hash).await,
            Backend::Memory(store) => Ok(store.delete_auth(token_hash)),
        }
    }

    pub async fn create_post(&self, post: &PostContent, author: Id<UserMarker>) -> Result<Post> {
        let id = self.next_id()?;
        let now = OffsetDateTime::now_utc();

        match &self.backend {
            Backend::Postgres(pool) => postgres::create_post(pool, id, post, author, now).await,
            Backend::Memory(store) => store.create_post(id, post, author, now),
        }
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::fetch_post(pool, post_id).await,
            Backend::Memory(store) => Ok(store.fetch_post(post_id)),
        }
    }

    pub async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        post: &PostContent,
    ) -> Result<Option<Post>> {
        let now = OffsetDateTime::now_utc();

        match &self.backend {
            Backend::Postgres(pool) => postgres::update_post(pool, post_id, post, now).await,
            Backend::Memory(store) => Ok(store.update_post(post_id, post, now)),
        }
    }

    /// Deletes the post with its comments. Returns whether the post existed.
    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::delete_post(pool, post_id).await,
            Backend::Memory(store) => Ok(store.delete_post(post_id)),
        }
    }

    pub async fn list_posts(&self, query: &PostListQuery) -> Result<PostPage> {
        debug!(?query, "Listing posts");

        match &self.backend {
            Backend::Postgres(pool) => postgres::list_posts(pool, query).await,
            Backend::Memory(store) => Ok(store.list_posts(query)),
        }
    }

    /// `None` if the post does not exist.
    pub async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        comment: &CommentContent,
    ) -> Result<Option<Comment>> {
        let id = self.next_id()?;
        let now = OffsetDateTime::now_utc();

        match &self.backend {
            Backend::Postgres(pool) => {
                postgres::create_comment(pool, id, post_id, author, comment, now).await
            }
            Backend::Memory(store) => store.create_comment(id, post_id, author, comment, now),
        }
    }

    /// Comments of a post, oldest first. `None` if the post does not exist.
    pub async fn list_post_comments(&self, post_id: Id<PostMarker>) -> Result<Option<Vec<Comment>>> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::list_post_comments(pool, post_id).await,
            Backend::Memory(store) => Ok(store.list_post_comments(post_id)),
        }
    }

    /// Newest comments first, optionally only those on posts carrying `tag`.
    pub async fn list_latest_comments(&self, tag: Option<&str>, limit: u32) -> Result<Vec<Comment>> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::list_latest_comments(pool, tag, limit).await,
            Backend::Memory(store) => Ok(store.list_latest_comments(tag, limit)),
        }
    }

    /// Most used tags, or with `tag` the tags used together with it.
    pub async fn list_tags(&self, tag: Option<&str>, limit: u32) -> Result<Vec<String>> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::list_tags(pool, tag, limit).await,
            Backend::Memory(store) => Ok(store.list_tags(tag, limit)),
        }
    }
}
