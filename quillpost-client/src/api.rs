use crate::error::ClientError;
use quillpost_common::{
    model::{
        Id, ImageRef,
        auth::AuthSession,
        comment::{Comment, CommentMarker},
        post::{Post, PostContent, PostMarker},
        user::{User, UserMarker, UserSummary},
    },
    query::{PostListParams, PostPage},
};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::debug;

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// A logged in user. Every call that needs authentication takes one explicitly.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Session {
    pub user: User,
    token: String,
}

impl Session {
    #[must_use]
    pub fn new(user: User, token: String) -> Self {
        Self { user, token }
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl From<AuthSession> for Session {
    fn from(session: AuthSession) -> Self {
        Self::new(session.user, session.token)
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct TagQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
}

/// Thin typed wrapper over the HTTP API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, session: Option<&Session>) -> RequestBuilder {
        let request = self.http.request(method, format!("{}{path}", self.base_url));
        match session {
            Some(session) => request.bearer_auth(session.token()),
            None => request,
        }
    }

    async fn reply(request: RequestBuilder) -> Result<Vec<u8>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            Ok(body.to_vec())
        } else {
            debug!(%status, "Request failed");
            Err(ClientError::from_reply(status.as_u16(), &body))
        }
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let body = Self::reply(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn list_posts(&self, params: &PostListParams) -> Result<PostPage> {
        Self::send(self.request(Method::GET, "/posts", None).query(params)).await
    }

    pub async fn list_user_posts(
        &self,
        user_id: Id<UserMarker>,
        params: &PostListParams,
    ) -> Result<PostPage> {
        let path = format!("/users/{user_id}/posts");
        Self::send(self.request(Method::GET, &path, None).query(params)).await
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Post> {
        Self::send(self.request(Method::GET, &format!("/posts/{post_id}"), None)).await
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<UserSummary> {
        Self::send(self.request(Method::GET, &format!("/users/{user_id}"), None)).await
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<Session> {
        let credentials = Credentials {
            name: Some(name),
            email,
            password,
        };
        let session: AuthSession =
            Self::send(self.request(Method::POST, "/auth/register", None).json(&credentials))
                .await?;
        Ok(session.into())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let credentials = Credentials {
            name: None,
            email,
            password,
        };
        let session: AuthSession =
            Self::send(self.request(Method::POST, "/auth/login", None).json(&credentials)).await?;
        Ok(session.into())
    }

    pub async fn me(&self, session: &Session) -> Result<User> {
        Self::send(self.request(Method::GET, "/auth/me", Some(session))).await
    }

    /// Changes the name and/or photo. `Some(None)` removes the photo.
    pub async fn update_profile(
        &self,
        session: &Session,
        name: Option<&str>,
        avatar: Option<Option<&ImageRef>>,
    ) -> Result<User> {
        let mut body = serde_json::Map::new();
        if let Some(name) = name {
            body.insert("name".to_owned(), json!(name));
        }
        if let Some(avatar) = avatar {
            body.insert("avatar".to_owned(), json!(avatar));
        }

        Self::send(
            self.request(Method::PATCH, "/auth/me", Some(session))
                .json(&body),
        )
        .await
    }

    /// Revokes the session's token on the server.
    pub async fn logout(&self, session: Session) -> Result<()> {
        Self::reply(self.request(Method::POST, "/auth/logout", Some(&session))).await?;
        Ok(())
    }

    pub async fn create_post(&self, session: &Session, post: &PostContent) -> Result<Post> {
        Self::send(self.request(Method::POST, "/posts", Some(session)).json(post)).await
    }

    pub async fn update_post(
        &self,
        session: &Session,
        post_id: Id<PostMarker>,
        post: &PostContent,
    ) -> Result<Post> {
        let path = format!("/posts/{post_id}");
        Self::send(self.request(Method::PATCH, &path, Some(session)).json(post)).await
    }

    pub async fn delete_post(&self, session: &Session, post_id: Id<PostMarker>) -> Result<()> {
        let path = format!("/posts/{post_id}");
        Self::reply(self.request(Method::DELETE, &path, Some(session))).await?;
        Ok(())
    }

    pub async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let path = format!("/posts/{post_id}/comments");
        Self::send(self.request(Method::GET, &path, None)).await
    }

    pub async fn create_comment(
        &self,
        session: &Session,
        post_id: Id<PostMarker>,
        text: &str,
    ) -> Result<Comment> {
        let path = format!("/posts/{post_id}/comments");
        Self::send(
            self.request(Method::POST, &path, Some(session))
                .json(&json!({ "text": text })),
        )
        .await
    }

    pub async fn latest_comments(&self, tag: Option<&str>) -> Result<Vec<Comment>> {
        Self::send(
            self.request(Method::GET, "/comments", None)
                .query(&TagQuery { tag }),
        )
        .await
    }

    pub async fn list_tags(&self, tag: Option<&str>) -> Result<Vec<String>> {
        Self::send(self.request(Method::GET, "/tags", None).query(&TagQuery { tag })).await
    }

    pub async fn set_favorite(
        &self,
        session: &Session,
        comment_id: Id<CommentMarker>,
        favorite: bool,
    ) -> Result<User> {
        let method = if favorite { Method::POST } else { Method::DELETE };
        let path = format!("/comments/{comment_id}/favorite");
        Self::send(self.request(method, &path, Some(session))).await
    }
}
