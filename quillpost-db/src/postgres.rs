use crate::{
    client::{DbError, NewUser, Result, UserCredentials},
    record::{AuthenticationRecord, CommentRecord, PostRecord, UserRecord},
};
use quillpost_common::model::{
    Id, ImageRef,
    auth::{AuthTokenHash, Authentication},
    comment::{Comment, CommentContent, CommentMarker},
    post::{Post, PostContent, PostMarker},
    user::{Email, UpdateProfile, User, UserMarker},
};
use quillpost_common::query::{PostFilter, PostListQuery, PostPage, PostSort};
use sqlx::{PgPool, Postgres, QueryBuilder, query, query_as, query_scalar};
use time::OffsetDateTime;

const USER_SELECT: &str = "
    SELECT
        users.user_snowflake,
        users.name,
        users.email,
        users.password_hash,
        users.avatar_url,
        users.avatar_img_id,
        ARRAY(
            SELECT favorite_comments.comment_snowflake
            FROM users.favorite_comments
            WHERE favorite_comments.user_snowflake = users.user_snowflake
            ORDER BY favorite_comments.favorited_at, favorite_comments.comment_snowflake
        ) AS favorite_comments,
        users.created_at,
        users.updated_at
    FROM
        users.users
";

const POST_SELECT: &str = "
    SELECT
        posts.post_snowflake,
        posts.title,
        posts.text,
        posts.img_url,
        posts.img_id,
        posts.tags,
        (
            SELECT COUNT(*)
            FROM posts.comments
            WHERE comments.post_snowflake = posts.post_snowflake
        ) AS comment_count,
        posts.created_at,
        posts.updated_at,
        users.user_snowflake,
        users.name,
        users.avatar_url,
        users.avatar_img_id
    FROM
        posts.posts
        JOIN users.users ON users.user_snowflake = posts.user_snowflake
";

const COMMENT_SELECT: &str = "
    SELECT
        comments.comment_snowflake,
        comments.post_snowflake,
        comments.text,
        comments.created_at,
        comments.updated_at,
        users.user_snowflake,
        users.name,
        users.avatar_url,
        users.avatar_img_id
    FROM
        posts.comments
        JOIN users.users ON users.user_snowflake = comments.user_snowflake
";

fn snowflake<Marker>(id: Id<Marker>) -> i64 {
    id.get().cast_signed()
}

fn image_columns(image: Option<&ImageRef>) -> (Option<&str>, Option<&str>) {
    image.map_or((None, None), |image| {
        (Some(image.url.as_str()), Some(image.img_id.as_str()))
    })
}

/// Unique index behind [`DbError::DuplicateEmail`].
const USERS_EMAIL_KEY: &str = "users_email_key";

fn map_insert_error(err: sqlx::Error, reference: &'static str) -> DbError {
    match &err {
        sqlx::Error::Database(database_error)
            if database_error.is_unique_violation()
                && database_error.constraint() == Some(USERS_EMAIL_KEY) =>
        {
            DbError::DuplicateEmail
        }
        sqlx::Error::Database(database_error) if database_error.is_foreign_key_violation() => {
            DbError::MissingReference(reference)
        }
        _ => err.into(),
    }
}

pub(crate) async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!().run(pool).await?;
    Ok(())
}

pub(crate) async fn create_user(
    pool: &PgPool,
    id: Id<UserMarker>,
    new_user: &NewUser,
    now: OffsetDateTime,
) -> Result<User> {
    query(
        "
        INSERT INTO users.users (user_snowflake, name, email, password_hash, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        ",
    )
    .bind(snowflake(id))
    .bind(new_user.name.get())
    .bind(new_user.email.get())
    .bind(new_user.password_hash.get())
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| map_insert_error(err, "user"))?;

    fetch_user(pool, id)
        .await?
        .ok_or(DbError::MissingReference("user"))
}

pub(crate) async fn fetch_user(pool: &PgPool, user_id: Id<UserMarker>) -> Result<Option<User>> {
    let record = query_as::<_, UserRecord>(&format!(
        "{USER_SELECT} WHERE users.user_snowflake = $1"
    ))
    .bind(snowflake(user_id))
    .fetch_optional(pool)
    .await?;

    let user = record.map(User::try_from).transpose()?;
    Ok(user)
}

pub(crate) async fn fetch_credentials(
    pool: &PgPool,
    email: &Email,
) -> Result<Option<UserCredentials>> {
    let record = query_as::<_, UserRecord>(&format!("{USER_SELECT} WHERE users.email = $1"))
        .bind(email.get())
        .fetch_optional(pool)
        .await?;

    let credentials = record.map(UserCredentials::try_from).transpose()?;
    Ok(credentials)
}

pub(crate) async fn update_user(
    pool: &PgPool,
    user_id: Id<UserMarker>,
    profile: &UpdateProfile,
    now: OffsetDateTime,
) -> Result<Option<User>> {
    let (avatar_url, avatar_img_id) =
        image_columns(profile.avatar.as_ref().and_then(Option::as_ref));

    let updated = query(
        "
        UPDATE users.users
        SET
            name = COALESCE($2, name),
            avatar_url = CASE WHEN $3 THEN $4 ELSE avatar_url END,
            avatar_img_id = CASE WHEN $3 THEN $5 ELSE avatar_img_id END,
            updated_at = $6
        WHERE user_snowflake = $1
        ",
    )
    .bind(snowflake(user_id))
    .bind(profile.name.as_ref().map(|name| name.get()))
    .bind(profile.avatar.is_some())
    .bind(avatar_url)
    .bind(avatar_img_id)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Ok(None);
    }
    fetch_user(pool, user_id).await
}

pub(crate) async fn set_favorite_comment(
    pool: &PgPool,
    user_id: Id<UserMarker>,
    comment_id: Id<CommentMarker>,
    favorite: bool,
) -> Result<Option<User>> {
    let comment_exists: bool = query_scalar(
        "SELECT EXISTS (SELECT 1 FROM posts.comments WHERE comment_snowflake = $1)",
    )
    .bind(snowflake(comment_id))
    .fetch_one(pool)
    .await?;

    if !comment_exists {
        return Ok(None);
    }

    let statement = if favorite {
        "
        INSERT INTO users.favorite_comments (user_snowflake, comment_snowflake)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "
    } else {
        "
        DELETE FROM users.favorite_comments
        WHERE user_snowflake = $1 AND comment_snowflake = $2
        "
    };

    query(statement)
        .bind(snowflake(user_id))
        .bind(snowflake(comment_id))
        .execute(pool)
        .await
        .map_err(|err| map_insert_error(err, "comment"))?;

    fetch_user(pool, user_id).await
}

pub(crate) async fn create_auth(pool: &PgPool, authentication: &Authentication) -> Result<()> {
    let record = AuthenticationRecord::from(authentication);

    query(
        "
        INSERT INTO users.authentications (token_hash, user_snowflake, created_at, expires_after_seconds)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(record.token_hash)
    .bind(record.user_snowflake)
    .bind(record.created_at)
    .bind(record.expires_after_seconds)
    .execute(pool)
    .await
    .map_err(|err| map_insert_error(err, "user"))?;

    Ok(())
}

pub(crate) async fn fetch_auth(
    pool: &PgPool,
    token_hash: &AuthTokenHash,
) -> Result<Option<Authentication>> {
    let record = query_as::<_, AuthenticationRecord>(
        "
        SELECT
            authentications.user_snowflake,
            authentications.token_hash,
            authentications.created_at,
            authentications.expires_after_seconds
        FROM
            users.authentications
        WHERE
            authentications.token_hash = $1
        ",
    )
    .bind(token_hash.0.as_slice())
    .fetch_optional(pool)
    .await?;

    let authentication = record.map(Authentication::try_from).transpose()?;
    Ok(authentication)
}

pub(crate) async fn delete_auth(pool: &PgPool, token_hash: &AuthTokenHash) -> Result<bool> {
    let deleted = query("DELETE FROM users.authentications WHERE token_hash = $1")
        .bind(token_hash.0.as_slice())
        .execute(pool)
        .await?
        .rows_affected();

    Ok(deleted > 0)
}

pub(crate) async fn create_post(
    pool: &PgPool,
    id: Id<PostMarker>,
    content: &PostContent,
    author: Id<UserMarker>,
    now: OffsetDateTime,
) -> Result<Post> {
    let (img_url, img_id) = image_columns(content.img.as_ref());
    let tags: Vec<&str> = content.tags.iter().map(|tag| tag.get()).collect();

    query(
        "
        INSERT INTO posts.posts (post_snowflake, user_snowflake, title, text, img_url, img_id, tags, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
        ",
    )
    .bind(snowflake(id))
    .bind(snowflake(author))
    .bind(content.title.get())
    .bind(content.text.get())
    .bind(img_url)
    .bind(img_id)
    .bind(tags)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| map_insert_error(err, "user"))?;

    fetch_post(pool, id)
        .await?
        .ok_or(DbError::MissingReference("post"))
}

pub(crate) async fn fetch_post(pool: &PgPool, post_id: Id<PostMarker>) -> Result<Option<Post>> {
    let record = query_as::<_, PostRecord>(&format!(
        "{POST_SELECT} WHERE posts.post_snowflake = $1"
    ))
    .bind(snowflake(post_id))
    .fetch_optional(pool)
    .await?;

    let post = record.map(Post::try_from).transpose()?;
    Ok(post)
}

pub(crate) async fn update_post(
    pool: &PgPool,
    post_id: Id<PostMarker>,
    content: &PostContent,
    now: OffsetDateTime,
) -> Result<Option<Post>> {
    let (img_url, img_id) = image_columns(content.img.as_ref());
    let tags: Vec<&str> = content.tags.iter().map(|tag| tag.get()).collect();

    let updated = query(
        "
        UPDATE posts.posts
        SET title = $2, text = $3, img_url = $4, img_id = $5, tags = $6, updated_at = $7
        WHERE post_snowflake = $1
        ",
    )
    .bind(snowflake(post_id))
    .bind(content.title.get())
    .bind(content.text.get())
    .bind(img_url)
    .bind(img_id)
    .bind(tags)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Ok(None);
    }
    fetch_post(pool, post_id).await
}

pub(crate) async fn delete_post(pool: &PgPool, post_id: Id<PostMarker>) -> Result<bool> {
    let deleted = query("DELETE FROM posts.posts WHERE post_snowflake = $1")
        .bind(snowflake(post_id))
        .execute(pool)
        .await?
        .rows_affected();

    Ok(deleted > 0)
}

/// Appends the `WHERE` clause shared by the page query and the count query.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
    builder.push(" WHERE TRUE");

    if let Some(tag) = &filter.tag {
        builder
            .push(" AND ")
            .push_bind(tag.clone())
            .push(" = ANY (posts.tags)");
    }
    if let Some(author) = filter.author {
        builder
            .push(" AND posts.user_snowflake = ")
            .push_bind(snowflake(author));
    }
    if let Some(pattern) = filter.title_like_pattern() {
        builder
            .push(" AND posts.title ILIKE ")
            .push_bind(pattern)
            .push(r" ESCAPE '\'");
    }
}

fn count_query(filter: &PostFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM posts.posts");
    push_filter(&mut builder, filter);
    builder
}

fn page_query(list_query: &PostListQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(POST_SELECT);
    push_filter(&mut builder, &list_query.filter);
    builder.push(match list_query.sort {
        PostSort::Newest => " ORDER BY posts.created_at DESC, posts.post_snowflake DESC",
        PostSort::Popular => {
            " ORDER BY comment_count DESC, posts.created_at DESC, posts.post_snowflake DESC"
        }
    });
    builder
        .push(" LIMIT ")
        .push_bind(i64::from(list_query.page.limit()))
        .push(" OFFSET ")
        .push_bind(i64::try_from(list_query.page.offset()).unwrap_or(i64::MAX));
    builder
}

pub(crate) async fn list_posts(pool: &PgPool, list_query: &PostListQuery) -> Result<PostPage> {
    let total_count: i64 = count_query(&list_query.filter)
        .build_query_scalar()
        .fetch_one(pool)
        .await?;

    let records: Vec<PostRecord> = page_query(list_query)
        .build_query_as()
        .fetch_all(pool)
        .await?;
    let posts = records
        .into_iter()
        .map(Post::try_from)
        .collect::<Result<_, _>>()?;

    Ok(PostPage {
        posts,
        total_count: total_count.cast_unsigned(),
    })
}

async fn post_exists(pool: &PgPool, post_id: Id<PostMarker>) -> Result<bool> {
    let exists = query_scalar("SELECT EXISTS (SELECT 1 FROM posts.posts WHERE post_snowflake = $1)")
        .bind(snowflake(post_id))
        .fetch_one(pool)
        .await?;

    Ok(exists)
}

pub(crate) async fn create_comment(
    pool: &PgPool,
    id: Id<CommentMarker>,
    post_id: Id<PostMarker>,
    author: Id<UserMarker>,
    content: &CommentContent,
    now: OffsetDateTime,
) -> Result<Option<Comment>> {
    if !post_exists(pool, post_id).await? {
        return Ok(None);
    }

    query(
        "
        INSERT INTO posts.comments (comment_snowflake, post_snowflake, user_snowflake, text, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        ",
    )
    .bind(snowflake(id))
    .bind(snowflake(post_id))
    .bind(snowflake(author))
    .bind(content.text.get())
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| map_insert_error(err, "post"))?;

    let record = query_as::<_, CommentRecord>(&format!(
        "{COMMENT_SELECT} WHERE comments.comment_snowflake = $1"
    ))
    .bind(snowflake(id))
    .fetch_optional(pool)
    .await?;

    let comment = record.map(Comment::try_from).transpose()?;
    Ok(comment)
}

pub(crate) async fn list_post_comments(
    pool: &PgPool,
    post_id: Id<PostMarker>,
) -> Result<Option<Vec<Comment>>> {
    if !post_exists(pool, post_id).await? {
        return Ok(None);
    }

    let records = query_as::<_, CommentRecord>(&format!(
        "
        {COMMENT_SELECT}
        WHERE comments.post_snowflake = $1
        ORDER BY comments.created_at, comments.comment_snowflake
        "
    ))
    .bind(snowflake(post_id))
    .fetch_all(pool)
    .await?;

    let comments = records
        .into_iter()
        .map(Comment::try_from)
        .collect::<Result<_, _>>()?;
    Ok(Some(comments))
}

pub(crate) async fn list_latest_comments(
    pool: &PgPool,
    tag: Option<&str>,
    limit: u32,
) -> Result<Vec<Comment>> {
    let records = query_as::<_, CommentRecord>(&format!(
        "
        {COMMENT_SELECT}
        JOIN posts.posts ON posts.post_snowflake = comments.post_snowflake
        WHERE $1::TEXT IS NULL OR $1 = ANY (posts.tags)
        ORDER BY comments.created_at DESC, comments.comment_snowflake DESC
        LIMIT $2
        "
    ))
    .bind(tag)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    let comments = records
        .into_iter()
        .map(Comment::try_from)
        .collect::<Result<_, _>>()?;
    Ok(comments)
}

pub(crate) async fn list_tags(pool: &PgPool, tag: Option<&str>, limit: u32) -> Result<Vec<String>> {
    let tags = query_scalar(
        r#"
        SELECT tag
        FROM
            posts.posts
            CROSS JOIN LATERAL unnest(posts.tags) AS tag
        WHERE $1::TEXT IS NULL OR ($1 = ANY (posts.tags) AND tag <> $1)
        GROUP BY tag
        ORDER BY COUNT(*) DESC, tag COLLATE "C"
        LIMIT $2
        "#,
    )
    .bind(tag)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    Ok(tags)
}
