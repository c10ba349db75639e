#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use quillpost_api::{
    config::ApiConfig,
    media::MediaStore,
    server::{self, ServerState},
};
use quillpost_common::snowflake::{ProcessId, WorkerId};
use quillpost_db::client::DbClient;
use serde_json::{Value, json};
use std::{path::PathBuf, sync::Arc};
use tower::ServiceExt;

pub struct TestApp {
    router: Router,
    pub media_dir: PathBuf,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        if self.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&self.body).unwrap()
        }
    }
}

impl TestApp {
    pub fn new() -> Self {
        let media_dir =
            std::env::temp_dir().join(format!("quillpost-api-test-{:016x}", rand::random::<u64>()));
        std::fs::create_dir_all(&media_dir).unwrap();

        let state = ServerState {
            db_client: Arc::new(DbClient::in_memory(
                WorkerId::new(1).unwrap(),
                ProcessId::new(1).unwrap(),
            )),
            media: Arc::new(MediaStore::new(media_dir.clone(), "/uploads", 1024)),
            config: ApiConfig::default(),
        };

        Self {
            router: server::app(state),
            media_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();

        TestResponse { status, body }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.send(request).await;
        (response.status, response.json())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, None).await
    }

    /// Registers `name` and returns the token and the user id.
    pub async fn register(&self, name: &str) -> (String, u64) {
        let (status, body) = self
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "name": name,
                    "email": format!("{name}@example.com"),
                    "password": "password",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");

        (
            body["token"].as_str().unwrap().to_owned(),
            body["user"]["id"].as_u64().unwrap(),
        )
    }

    pub async fn create_post(&self, token: &str, title: &str, tags: &[&str]) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/posts",
                Some(token),
                Some(json!({ "title": title, "text": "Some text", "tags": tags })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    pub async fn comment(&self, token: &str, post_id: u64, text: &str) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                &format!("/posts/{post_id}/comments"),
                Some(token),
                Some(json!({ "text": text })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.media_dir);
    }
}

pub fn titles(page: &Value) -> Vec<String> {
    page["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["title"].as_str().unwrap().to_owned())
        .collect()
}
