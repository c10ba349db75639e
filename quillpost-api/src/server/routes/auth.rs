use crate::{
    config::ApiConfig,
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        json::{Created, Json},
    },
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use quillpost_common::model::{
    auth::{AuthSession, AuthToken, Authentication},
    user::{CreateUser, LoginUser, UpdateProfile, User},
};
use quillpost_db::client::{DbClient, NewUser};
use serde::Deserialize;
use std::sync::Arc;
use time::UtcDateTime;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(login)
        .typed_get(get_me)
        .typed_patch(update_me)
        .typed_post(logout)
}

/// Stores a fresh token for `user` and hands out its string form.
async fn issue_session(db: &DbClient, config: ApiConfig, user: User) -> Result<AuthSession> {
    let token = AuthToken::generate_random(user.id);
    let authentication = Authentication {
        user: user.id,
        token_hash: token.hash()?,
        created_at: UtcDateTime::now(),
        expires_after: config.token_ttl,
    };
    db.create_auth(&authentication).await?;

    Ok(AuthSession {
        user,
        token: token.as_token_str(),
    })
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/register", rejection(ServerError))]
struct RegisterPath();

async fn register(
    RegisterPath(): RegisterPath,
    State(db): State<Arc<DbClient>>,
    State(config): State<ApiConfig>,
    Json(new_user): Json<CreateUser>,
) -> Result<Created<AuthSession>> {
    let password_hash = new_user.password.hash()?;
    let user = db
        .create_user(&NewUser {
            name: new_user.name,
            email: new_user.email,
            password_hash,
        })
        .await?;
    info!(user = %user.id, "Registered user");

    let session = issue_session(&db, config, user).await?;
    Ok(Created(session))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login", rejection(ServerError))]
struct LoginPath();

async fn login(
    LoginPath(): LoginPath,
    State(db): State<Arc<DbClient>>,
    State(config): State<ApiConfig>,
    Json(credentials): Json<LoginUser>,
) -> Result<Json<AuthSession>> {
    let stored = db
        .fetch_credentials(&credentials.email)
        .await?
        .ok_or(ServerError::InvalidCredentials)?;

    if !stored.password_hash.verify(&credentials.password) {
        return Err(ServerError::InvalidCredentials);
    }

    let session = issue_session(&db, config, stored.user).await?;
    Ok(Json(session))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/me", rejection(ServerError))]
struct MePath();

async fn get_me(
    MePath(): MePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<User>> {
    let user_id = user.user_id();
    let user = db
        .fetch_user(user_id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(user_id))?;

    Ok(Json(user))
}

async fn update_me(
    MePath(): MePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(profile): Json<UpdateProfile>,
) -> Result<Json<User>> {
    let user_id = user.user_id();
    let user = db
        .update_user(user_id, &profile)
        .await?
        .ok_or(ServerError::UserByIdNotFound(user_id))?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.delete_auth(user.token_hash()).await?;
    Ok(StatusCode::NO_CONTENT)
}
