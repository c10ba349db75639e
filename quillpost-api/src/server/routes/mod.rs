use crate::server::ServerRouter;
use serde::Deserialize;

mod auth;
mod comments;
mod posts;
mod tags;
mod upload;
mod users;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(auth::routes())
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(tags::routes())
        .merge(users::routes())
        .merge(upload::routes())
}

/// `?tag=` of the feed endpoints. A blank tag means no restriction.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct TagParams {
    #[serde(default)]
    tag: Option<String>,
}

impl TagParams {
    fn tag(&self) -> Option<&str> {
        quillpost_common::util::non_blank(self.tag.as_deref())
    }
}
