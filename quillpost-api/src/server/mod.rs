use crate::{
    config::ApiConfig,
    media::{MediaError, MediaStore},
};
use axum::{
    Router,
    extract::{
        DefaultBodyLimit, FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use quillpost_common::model::{
    ErrorResponse, Id,
    auth::{AuthTokenDecodeError, AuthTokenHashError, PasswordHashError},
    comment::CommentMarker,
    post::PostMarker,
    user::UserMarker,
};
use quillpost_common::query::QueryError;
use quillpost_db::client::{DbClient, DbError};
use std::sync::Arc;
use thiserror::Error;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::error;

mod auth;
mod json;
mod query;
mod routes;

/// Path the stored images are served under.
pub const UPLOADS_PATH: &str = "/uploads";

/// Room for multipart framing on top of the largest accepted image.
const MULTIPART_OVERHEAD: usize = 64 * 1024;
const MIN_BODY_LIMIT: usize = 2 * 1024 * 1024;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub media: Arc<MediaStore>,
    pub config: ApiConfig,
}

/// The complete application: API routes, uploaded files, tracing.
pub fn app(state: ServerState) -> Router {
    let body_limit = (state.media.max_bytes() + MULTIPART_OVERHEAD).max(MIN_BODY_LIMIT);
    let uploads = ServeDir::new(state.media.dir());

    routes::routes()
        .nest_service(UPLOADS_PATH, uploads)
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Multipart body rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Multipart body could not be read: {0}")]
    Multipart(#[from] MultipartError),
    #[error("The multipart body has no image field")]
    MissingImage,
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Wrong email or password")]
    InvalidCredentials,
    #[error("Only the author may change this post")]
    NotAuthor,
    #[error(transparent)]
    InvalidQuery(#[from] QueryError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
    #[error("Comment with id {0} was not found.")]
    CommentByIdNotFound(Id<CommentMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByIdNotFound(_)
            | ServerError::CommentByIdNotFound(_)
            | ServerError::Media(MediaError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken | ServerError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::NotAuthor => StatusCode::FORBIDDEN,
            ServerError::Database(DbError::DuplicateEmail) => StatusCode::CONFLICT,
            ServerError::Media(MediaError::UnsupportedType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ServerError::Media(MediaError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Multipart(err) => err.status(),
            ServerError::MultipartRejection(rejection) => rejection.status(),
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::MissingImage
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::InvalidQuery(_)
            | ServerError::Media(MediaError::Empty) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_)
            | ServerError::Database(_)
            | ServerError::Media(MediaError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let message = if status.is_server_error() {
            "Internal server error".to_owned()
        } else {
            self.to_string()
        };
        let error_response = ErrorResponse {
            status: status.as_u16(),
            message,
        };
        (status, Json(error_response)).into_response()
    }
}
