use crate::{
    config::ApiConfig,
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        json::{Created, Json},
        query::Query,
    },
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use quillpost_common::{
    model::{
        Id,
        post::{Post, PostContent, PostMarker},
    },
    query::{PostListParams, PostPage},
};
use quillpost_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_patch(update_post)
        .typed_delete(delete_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

async fn list_posts(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    State(config): State<ApiConfig>,
    Query(params): Query<PostListParams>,
) -> Result<Json<PostPage>> {
    let query = params.into_query(config.pagination)?;
    let page = db.list_posts(&query).await?;

    Ok(Json(page))
}

async fn create_post(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(post): Json<PostContent>,
) -> Result<Created<Post>> {
    let post = db.create_post(&post, user.user_id()).await?;

    Ok(Created(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Post>> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

/// Fetches the post and checks that `user` wrote it.
async fn authored_post(db: &DbClient, id: Id<PostMarker>, user: &AuthenticatedUser) -> Result<Post> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    if post.author.id != user.user_id() {
        return Err(ServerError::NotAuthor);
    }
    Ok(post)
}

async fn update_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(content): Json<PostContent>,
) -> Result<Json<Post>> {
    authored_post(&db, id, &user).await?;

    let post = db
        .update_post(id, &content)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    authored_post(&db, id, &user).await?;

    if !db.delete_post(id).await? {
        return Err(ServerError::PostByIdNotFound(id));
    }
    Ok(StatusCode::NO_CONTENT)
}
