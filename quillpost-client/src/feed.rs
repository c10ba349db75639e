use crate::{
    api::ApiClient,
    state::{Applied, PostListState},
};
use parking_lot::Mutex;
use quillpost_common::query::PostListParams;
use std::sync::Arc;
use tracing::debug;

/// What became of one [`PostFeed::load`].
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum LoadOutcome {
    Loaded { total_count: u64 },
    Failed { message: String },
    /// A newer load was started before this one finished.
    Superseded,
}

/// A post list view backed by the API.
///
/// Loads may overlap; the state always ends up showing the most recently
/// started one.
#[derive(Clone, Debug)]
pub struct PostFeed {
    api: ApiClient,
    state: Arc<Mutex<PostListState>>,
}

impl PostFeed {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Arc::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &Arc<Mutex<PostListState>> {
        &self.state
    }

    #[must_use]
    pub fn snapshot(&self) -> PostListState {
        self.state.lock().clone()
    }

    pub async fn load(&self, params: PostListParams) -> LoadOutcome {
        let ticket = self.state.lock().begin(params.clone());
        let result = self.api.list_posts(&params).await;

        let mut state = self.state.lock();
        match result {
            Ok(page) => {
                let total_count = page.total_count;
                match state.succeed(ticket, page) {
                    Applied::Applied => LoadOutcome::Loaded { total_count },
                    Applied::Superseded => {
                        debug!(?ticket, "Discarding superseded posts");
                        LoadOutcome::Superseded
                    }
                }
            }
            Err(err) => {
                let message = err.user_message();
                match state.fail(ticket, message.clone()) {
                    Applied::Applied => {
                        debug!(error = %err, "Loading posts failed");
                        LoadOutcome::Failed { message }
                    }
                    Applied::Superseded => {
                        debug!(?ticket, error = %err, "Discarding superseded failure");
                        LoadOutcome::Superseded
                    }
                }
            }
        }
    }
}
