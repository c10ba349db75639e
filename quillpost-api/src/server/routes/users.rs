use crate::{
    config::ApiConfig,
    server::{Result, ServerError, ServerRouter, json::Json, query::Query},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use quillpost_common::{
    model::{
        Id,
        user::{UserMarker, UserSummary},
    },
    query::{PostListParams, PostPage},
};
use quillpost_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_user)
        .typed_get(get_user_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct UserPath {
    id: Id<UserMarker>,
}

/// Public profile. Email and favorites are only visible through `/auth/me`.
async fn get_user(
    UserPath { id }: UserPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<UserSummary>> {
    let user = db
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(UserSummary::from(&user)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/posts", rejection(ServerError))]
struct UserPostsPath {
    id: Id<UserMarker>,
}

/// The listing contract with the author filter pinned to the path user.
async fn get_user_posts(
    UserPostsPath { id }: UserPostsPath,
    State(db): State<Arc<DbClient>>,
    State(config): State<ApiConfig>,
    Query(params): Query<PostListParams>,
) -> Result<Json<PostPage>> {
    db.fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    let mut query = PostListParams {
        user: None,
        ..params
    }
    .into_query(config.pagination)?;
    query.filter.author = Some(id);

    let page = db.list_posts(&query).await?;
    Ok(Json(page))
}
