use crate::{
    media::{ImageFormat, MediaStore},
    server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Created},
};
use axum::{
    extract::{
        Multipart, State,
        multipart::MultipartRejection,
    },
    http::StatusCode,
};
use axum_extra::routing::{RouterExt, TypedPath};
use quillpost_common::model::ImageRef;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Multipart field carrying the image.
const IMAGE_FIELD: &str = "image";

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(upload_image)
        .typed_delete(delete_image)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/upload", rejection(ServerError))]
struct UploadPath();

async fn upload_image(
    UploadPath(): UploadPath,
    State(media): State<Arc<MediaStore>>,
    user: AuthenticatedUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Created<ImageRef>> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            debug!(name = ?field.name(), "Skipping multipart field");
            continue;
        }

        let format = ImageFormat::detect(field.content_type(), field.file_name())?;
        let bytes = field.bytes().await?;
        let image = media.save(format, &bytes).await?;
        debug!(user = %user.user_id(), img_id = %image.img_id, "Uploaded image");

        return Ok(Created(image));
    }

    Err(ServerError::MissingImage)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/upload/{img_id}", rejection(ServerError))]
struct ImagePath {
    img_id: String,
}

async fn delete_image(
    ImagePath { img_id }: ImagePath,
    State(media): State<Arc<MediaStore>>,
    _user: AuthenticatedUser,
) -> Result<StatusCode> {
    media.delete(&img_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
