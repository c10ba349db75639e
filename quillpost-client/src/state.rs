//! State of one post list view.
//!
//! Every fetch is started with [`PostListState::begin`], which hands out a
//! [`RequestTicket`]. Results are applied only for the most recently issued
//! ticket, so a slow response to an older query can never overwrite the result
//! of a newer one. A failure leaves the last good page on display.

use quillpost_common::{
    model::post::Post,
    query::{PostListParams, PostPage},
};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum ItemStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

/// Identifies one fetch. Later tickets compare greater.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct RequestTicket(u64);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Applied {
    Applied,
    /// A newer request was issued in the meantime; nothing changed.
    Superseded,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostListState {
    status: ItemStatus,
    posts: Vec<Post>,
    total_count: u64,
    error: Option<String>,
    query: PostListParams,
    latest_ticket: u64,
}

impl PostListState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> ItemStatus {
        self.status
    }

    #[must_use]
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The parameters of the most recently started request.
    #[must_use]
    pub fn query(&self) -> &PostListParams {
        &self.query
    }

    #[must_use]
    pub fn is_latest(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.latest_ticket
    }

    pub fn begin(&mut self, query: PostListParams) -> RequestTicket {
        self.latest_ticket += 1;
        self.status = ItemStatus::Loading;
        self.query = query;

        RequestTicket(self.latest_ticket)
    }

    pub fn succeed(&mut self, ticket: RequestTicket, page: PostPage) -> Applied {
        if !self.is_latest(ticket) {
            return Applied::Superseded;
        }

        self.status = ItemStatus::Loaded;
        self.posts = page.posts;
        self.total_count = page.total_count;
        self.error = None;
        Applied::Applied
    }

    pub fn fail(&mut self, ticket: RequestTicket, message: impl Into<String>) -> Applied {
        if !self.is_latest(ticket) {
            return Applied::Superseded;
        }

        self.status = ItemStatus::Error;
        self.error = Some(message.into());
        Applied::Applied
    }
}

#[cfg(test)]
mod tests {
    use crate::state::{Applied, ItemStatus, PostListState};
    use quillpost_common::{
        model::{
            Id,
            post::{Post, PostText, PostTitle},
            user::{UserName, UserSummary},
        },
        query::{PostListParams, PostPage},
    };
    use time::macros::datetime;

    fn page(titles: &[&str], total_count: u64) -> PostPage {
        let posts = titles
            .iter()
            .zip(1_u64..)
            .map(|(title, id)| Post {
                id: Id::from(id),
                title: PostTitle::new((*title).to_owned()).unwrap(),
                text: PostText::new("Text".to_owned()).unwrap(),
                img: None,
                tags: Vec::new(),
                author: UserSummary {
                    id: Id::from(1_u64),
                    name: UserName::new("Ada".to_owned()).unwrap(),
                    avatar: None,
                },
                comment_count: 0,
                created_at: datetime!(2025-03-01 12:00 UTC),
                updated_at: datetime!(2025-03-01 12:00 UTC),
            })
            .collect();

        PostPage { posts, total_count }
    }

    fn titles(state: &PostListState) -> Vec<&str> {
        state.posts().iter().map(|post| post.title.get()).collect()
    }

    #[test]
    fn loads() {
        let mut state = PostListState::new();
        assert_eq!(state.status(), ItemStatus::Idle);

        let ticket = state.begin(PostListParams::default().tag("go"));
        assert_eq!(state.status(), ItemStatus::Loading);
        assert_eq!(state.query().tag.as_deref(), Some("go"));

        assert_eq!(state.succeed(ticket, page(&["Beta"], 2)), Applied::Applied);
        assert_eq!(state.status(), ItemStatus::Loaded);
        assert_eq!(titles(&state), vec!["Beta"]);
        assert_eq!(state.total_count(), 2);
    }

    #[test]
    fn late_older_result_is_discarded() {
        let mut state = PostListState::new();
        let first = state.begin(PostListParams::default().tag("go"));
        let second = state.begin(PostListParams::default().tag("rust"));

        assert_eq!(state.succeed(second, page(&["Gamma"], 1)), Applied::Applied);
        assert_eq!(
            state.succeed(first, page(&["Alpha", "Beta"], 2)),
            Applied::Superseded
        );

        assert_eq!(titles(&state), vec!["Gamma"]);
        assert_eq!(state.total_count(), 1);
        assert_eq!(state.query().tag.as_deref(), Some("rust"));
    }

    #[test]
    fn early_older_result_is_discarded_too() {
        let mut state = PostListState::new();
        let first = state.begin(PostListParams::default());
        let second = state.begin(PostListParams::default().page(2));

        assert_eq!(state.succeed(first, page(&["Alpha"], 3)), Applied::Superseded);
        assert_eq!(state.status(), ItemStatus::Loading);
        assert!(state.posts().is_empty());

        assert_eq!(state.fail(second, "Server down"), Applied::Applied);
        assert_eq!(state.status(), ItemStatus::Error);
    }

    #[test]
    fn failure_keeps_the_last_page() {
        let mut state = PostListState::new();
        let ticket = state.begin(PostListParams::default());
        state.succeed(ticket, page(&["Alpha", "Beta"], 2));

        let ticket = state.begin(PostListParams::default().page(2));
        assert_eq!(state.fail(ticket, "Could not reach the server"), Applied::Applied);

        assert_eq!(state.status(), ItemStatus::Error);
        assert_eq!(state.error(), Some("Could not reach the server"));
        assert_eq!(titles(&state), vec!["Alpha", "Beta"]);
        assert_eq!(state.total_count(), 2);

        let ticket = state.begin(PostListParams::default());
        state.succeed(ticket, page(&["Alpha"], 1));
        assert_eq!(state.error(), None);
    }

    #[test]
    fn stale_failure_is_ignored() {
        let mut state = PostListState::new();
        let first = state.begin(PostListParams::default());
        let second = state.begin(PostListParams::default());

        state.succeed(second, page(&["Alpha"], 1));
        assert_eq!(state.fail(first, "timeout"), Applied::Superseded);
        assert_eq!(state.status(), ItemStatus::Loaded);
        assert_eq!(state.error(), None);
    }
}
