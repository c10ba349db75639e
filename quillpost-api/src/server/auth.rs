use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use quillpost_common::model::{
    Id,
    auth::{AuthToken, AuthTokenHash},
    user::UserMarker,
};
use quillpost_db::client::DbClient;
use std::sync::Arc;
use time::UtcDateTime;
use tracing::debug;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The caller behind a valid, unexpired bearer token.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
    token_hash: AuthTokenHash,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.id
    }

    /// Hash of the token this request was made with.
    #[must_use]
    pub fn token_hash(&self) -> &AuthTokenHash {
        &self.token_hash
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let request_token: AuthToken = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?
            .token()
            .parse()?;

        let token_hash = request_token.hash()?;

        let authentication = Arc::<DbClient>::from_ref(state)
            .fetch_auth(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        if authentication.user != request_token.user_id {
            return Err(ServerError::InvalidToken);
        }
        if authentication.is_expired_at(UtcDateTime::now()) {
            debug!(user = %authentication.user, "Rejecting expired token");
            return Err(ServerError::InvalidToken);
        }

        Ok(Self {
            id: authentication.user,
            token_hash,
        })
    }
}
