use quillpost_api::{
    config::ApiConfig,
    media::MediaStore,
    server::{self, ServerState},
};
use quillpost_client::{
    api::{ApiClient, Session},
    feed::{LoadOutcome, PostFeed},
    state::ItemStatus,
};
use quillpost_common::{
    model::{
        post::{PostContent, PostTag, PostText, PostTitle},
        user::UserSummary,
    },
    query::{PostListParams, PostSort},
    snowflake::{ProcessId, WorkerId},
};
use quillpost_db::client::DbClient;
use std::sync::Arc;

/// Serves a fresh in-memory instance on an ephemeral port.
async fn spawn_server() -> ApiClient {
    let state = ServerState {
        db_client: Arc::new(DbClient::in_memory(
            WorkerId::new(2).unwrap(),
            ProcessId::new(0).unwrap(),
        )),
        media: Arc::new(MediaStore::new(
            std::env::temp_dir().join("quillpost-client-test-unused"),
            "/uploads",
            1024,
        )),
        config: ApiConfig::default(),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::app(state)).await.unwrap();
    });

    ApiClient::new(&format!("http://{address}"))
}

fn content(title: &str, tags: &[&str]) -> PostContent {
    PostContent {
        title: PostTitle::new(title.to_owned()).unwrap(),
        text: PostText::new("Some text".to_owned()).unwrap(),
        tags: tags
            .iter()
            .map(|tag| PostTag::new((*tag).to_owned()).unwrap())
            .collect(),
        img: None,
    }
}

async fn seeded() -> (ApiClient, Session) {
    let api = spawn_server().await;
    let session = api
        .register("Ada", "ada@example.com", "password")
        .await
        .unwrap();

    for (title, tags) in [
        ("Alpha", &["go"][..]),
        ("Beta", &["go", "rust"][..]),
        ("Gamma", &["rust"][..]),
    ] {
        api.create_post(&session, &content(title, tags)).await.unwrap();
    }

    (api, session)
}

fn titles(feed: &PostFeed) -> Vec<String> {
    feed.snapshot()
        .posts()
        .iter()
        .map(|post| post.title.get().to_owned())
        .collect()
}

#[tokio::test]
async fn feed_loads_filtered_pages() {
    let (api, _) = seeded().await;
    let feed = PostFeed::new(api);

    let outcome = feed
        .load(PostListParams::default().tag("go").page(1).limit(1))
        .await;
    assert_eq!(outcome, LoadOutcome::Loaded { total_count: 2 });
    assert_eq!(titles(&feed), vec!["Beta"]);
    assert_eq!(feed.snapshot().status(), ItemStatus::Loaded);
}

#[tokio::test]
async fn overlapping_loads_show_the_latest() {
    let (api, _) = seeded().await;
    let feed = PostFeed::new(api);

    let (first, second) = tokio::join!(
        feed.load(PostListParams::default().tag("go")),
        feed.load(PostListParams::default().tag("rust")),
    );

    assert_eq!(first, LoadOutcome::Superseded);
    assert_eq!(second, LoadOutcome::Loaded { total_count: 2 });
    assert_eq!(titles(&feed), vec!["Gamma", "Beta"]);
    assert_eq!(feed.snapshot().query().tag.as_deref(), Some("rust"));
}

#[tokio::test]
async fn failure_keeps_previous_posts() {
    let (api, _) = seeded().await;
    let feed = PostFeed::new(api);

    feed.load(PostListParams::default().sort(PostSort::Popular))
        .await;
    let before = titles(&feed);
    assert_eq!(before.len(), 3);

    let mut bogus = PostListParams::default();
    bogus.sort = Some("sideways".to_owned());
    let outcome = feed.load(bogus).await;

    let LoadOutcome::Failed { message } = outcome else {
        panic!("expected a failure, got {outcome:?}");
    };
    assert!(message.contains("sideways"), "{message}");

    let state = feed.snapshot();
    assert_eq!(state.status(), ItemStatus::Error);
    assert_eq!(state.error(), Some(message.as_str()));
    assert_eq!(titles(&feed), before);
    assert_eq!(state.total_count(), 3);
}

#[tokio::test]
async fn unreachable_server_is_a_displayable_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let feed = PostFeed::new(ApiClient::new(&format!("http://{address}")));
    let outcome = feed.load(PostListParams::default()).await;

    assert_eq!(
        outcome,
        LoadOutcome::Failed {
            message: "Could not reach the server. Check your connection and try again."
                .to_owned()
        }
    );
}

#[tokio::test]
async fn session_round_trip() {
    let (api, session) = seeded().await;

    let me = api.me(&session).await.unwrap();
    assert_eq!(me.id, session.user.id);
    assert_eq!(api.fetch_user(me.id).await.unwrap(), UserSummary::from(&me));

    let again = api.login("ada@example.com", "password").await.unwrap();
    let page = api
        .list_user_posts(again.user.id, &PostListParams::default().tag("rust"))
        .await
        .unwrap();
    assert_eq!(page.total_count, 2);

    let post = page.posts[0].clone();
    let comment = api
        .create_comment(&session, post.id, "Nice one")
        .await
        .unwrap();
    let user = api.set_favorite(&again, comment.id, true).await.unwrap();
    assert_eq!(user.favorite_comments, vec![comment.id]);
    assert_eq!(api.list_comments(post.id).await.unwrap(), vec![comment]);
    assert_eq!(api.list_tags(Some("rust")).await.unwrap(), vec!["go"]);

    api.logout(session.clone()).await.unwrap();
    let err = api.me(&session).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(api.me(&again).await.is_ok());
}
