use crate::{
    config::ApiConfig,
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        json::{Created, Json},
        query::Query,
        routes::TagParams,
    },
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use quillpost_common::model::{
    Id,
    comment::{Comment, CommentContent, CommentMarker},
    post::PostMarker,
    user::User,
};
use quillpost_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_post_comments)
        .typed_post(create_comment)
        .typed_get(latest_comments)
        .typed_post(add_favorite)
        .typed_delete(remove_favorite)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct PostCommentsPath {
    id: Id<PostMarker>,
}

async fn list_post_comments(
    PostCommentsPath { id }: PostCommentsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Comment>>> {
    let comments = db
        .list_post_comments(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(comments))
}

async fn create_comment(
    PostCommentsPath { id }: PostCommentsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(comment): Json<CommentContent>,
) -> Result<Created<Comment>> {
    let comment = db
        .create_comment(id, user.user_id(), &comment)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Created(comment))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/comments", rejection(ServerError))]
struct CommentsPath();

async fn latest_comments(
    CommentsPath(): CommentsPath,
    State(db): State<Arc<DbClient>>,
    State(config): State<ApiConfig>,
    Query(params): Query<TagParams>,
) -> Result<Json<Vec<Comment>>> {
    let comments = db
        .list_latest_comments(params.tag(), config.feed_limit)
        .await?;

    Ok(Json(comments))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/comments/{id}/favorite", rejection(ServerError))]
struct FavoritePath {
    id: Id<CommentMarker>,
}

async fn set_favorite(
    db: &DbClient,
    id: Id<CommentMarker>,
    user: &AuthenticatedUser,
    favorite: bool,
) -> Result<Json<User>> {
    let user = db
        .set_favorite_comment(user.user_id(), id, favorite)
        .await?
        .ok_or(ServerError::CommentByIdNotFound(id))?;

    Ok(Json(user))
}

async fn add_favorite(
    FavoritePath { id }: FavoritePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<User>> {
    set_favorite(&db, id, &user, true).await
}

async fn remove_favorite(
    FavoritePath { id }: FavoritePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<User>> {
    set_favorite(&db, id, &user, false).await
}
