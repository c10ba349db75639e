mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn register_login_and_logout() {
    let app = TestApp::new();
    let (token, user_id) = app.register("ada").await;

    let (status, me) = app.request(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user_id);
    assert_eq!(me["email"], "ada@example.com");
    assert!(me.get("passwordHash").is_none());

    let (status, session) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ADA@example.com", "password": "password" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let second_token = session["token"].as_str().unwrap().to_owned();
    assert_ne!(second_token, token);

    let (status, _) = app.request(Method::POST, "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.request(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .request(Method::GET, "/auth/me", Some(&second_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn bad_credentials_look_the_same() {
    let app = TestApp::new();
    app.register("ada").await;

    let (wrong_password, wrong_password_body) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "not it" })),
        )
        .await;
    let (unknown_email, unknown_email_body) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "eve@example.com", "password": "password" })),
        )
        .await;

    assert_eq!(wrong_password, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password_body, unknown_email_body);
}

#[tokio::test]
async fn registration_is_validated() {
    let app = TestApp::new();
    app.register("ada").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "name": "Ada", "email": "ada@EXAMPLE.com", "password": "password" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);

    for invalid in [
        json!({ "name": "", "email": "x@example.com", "password": "password" }),
        json!({ "name": "X", "email": "nope", "password": "password" }),
        json!({ "name": "X", "email": "x@example.com", "password": "short" }),
        json!({ "name": "X", "email": "x@example.com" }),
    ] {
        let (status, _) = app
            .request(Method::POST, "/auth/register", None, Some(invalid.clone()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{invalid}");
    }
}

#[tokio::test]
async fn authorization_header_errors() {
    let app = TestApp::new();

    let (status, _) = app.get("/auth/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::GET, "/auth/me", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (token, _) = app.register("ada").await;
    let (user_id, rest) = token.split_once(':').unwrap();
    let forged = format!("{}:{rest}", user_id.parse::<u64>().unwrap() + 1);
    let (status, _) = app.request(Method::GET, "/auth/me", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_updates() {
    let app = TestApp::new();
    let (token, _) = app.register("ada").await;

    let (status, user) = app
        .request(
            Method::PATCH,
            "/auth/me",
            Some(&token),
            Some(json!({
                "name": "Ada L.",
                "avatar": { "url": "/uploads/a.png", "imgId": "a.png" },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["name"], "Ada L.");
    assert_eq!(user["avatar"]["imgId"], "a.png");

    let (_, user) = app
        .request(
            Method::PATCH,
            "/auth/me",
            Some(&token),
            Some(json!({ "avatar": { "url": "", "imgId": "" } })),
        )
        .await;
    assert_eq!(user["avatar"], serde_json::Value::Null);
    assert_eq!(user["name"], "Ada L.");

    let (status, _) = app
        .request(Method::PATCH, "/auth/me", Some(&token), Some(json!({ "name": " " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn public_profile_hides_private_fields() {
    let app = TestApp::new();
    let (_, user_id) = app.register("ada").await;

    let (status, profile) = app.get(&format!("/users/{user_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        profile,
        json!({ "id": user_id, "name": "ada", "avatar": null })
    );
    assert!(profile.get("email").is_none());
    assert!(profile.get("favoriteComments").is_none());
}
