use crate::{
    config::ApiConfig,
    server::{Result, ServerError, ServerRouter, json::Json, query::Query, routes::TagParams},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use quillpost_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(list_tags)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/tags", rejection(ServerError))]
struct TagsPath();

/// Most used tags, or the ones that appear next to `?tag=`.
async fn list_tags(
    TagsPath(): TagsPath,
    State(db): State<Arc<DbClient>>,
    State(config): State<ApiConfig>,
    Query(params): Query<TagParams>,
) -> Result<Json<Vec<String>>> {
    let tags = db.list_tags(params.tag(), config.feed_limit).await?;

    Ok(Json(tags))
}
