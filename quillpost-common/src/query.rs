//! The post listing contract.
//!
//! Clients send raw, all-optional parameters ([`PostListParams`]). The server turns
//! them into a [`PostListQuery`] once, and every store backend evaluates that same
//! value: filters combine with AND, the sort order always ends in a total order
//! (creation time, then id), and paging is 1-indexed with a count over the
//! filtered set.
//!
//! Absent or blank parameters never fail. Only values that cannot mean anything
//! (a non-numeric page, an unknown sort mode) are rejected.

use crate::{
    model::{
        Id,
        post::Post,
        user::UserMarker,
    },
    util::non_blank,
};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, num::IntErrorKind, str::FromStr};
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 3;
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum QueryError {
    #[error("Unknown sort mode: {0:?}")]
    UnknownSort(String),
    #[error("The user filter is not a valid id: {0:?}")]
    InvalidUserId(String),
    #[error("The page is not an integer: {0:?}")]
    InvalidPage(String),
    #[error("The limit is not an integer: {0:?}")]
    InvalidLimit(String),
}

/// Page size bounds applied while parsing `limit`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl PaginationConfig {
    /// Keeps the default inside `1..=max_page_size`.
    #[must_use]
    pub fn new(default_page_size: u32, max_page_size: u32) -> Self {
        let max_page_size = max_page_size.max(1);
        Self {
            default_page_size: default_page_size.clamp(1, max_page_size),
            max_page_size,
        }
    }
}

/// Raw listing parameters, exactly as they appear in `GET /posts?...`.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostListParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

impl PostListParams {
    #[must_use]
    pub fn sort(mut self, sort: PostSort) -> Self {
        self.sort = Some(sort.as_str().to_owned());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn user(mut self, user: Id<UserMarker>) -> Self {
        self.user = Some(user.to_string());
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit.to_string());
        self
    }

    #[must_use]
    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page.to_string());
        self
    }

    pub fn into_query(self, config: PaginationConfig) -> Result<PostListQuery, QueryError> {
        let sort = match non_blank(self.sort.as_deref()) {
            Some(sort) => sort.parse()?,
            None => PostSort::default(),
        };

        let author = non_blank(self.user.as_deref())
            .map(|user| {
                user.parse()
                    .map_err(|_| QueryError::InvalidUserId(user.to_owned()))
            })
            .transpose()?;

        let filter = PostFilter {
            tag: non_blank(self.tag.as_deref()).map(str::to_owned),
            author,
            title: non_blank(self.title.as_deref()).map(str::to_owned),
        };

        let page = parse_int(self.page.as_deref(), QueryError::InvalidPage)?;
        let limit = parse_int(self.limit.as_deref(), QueryError::InvalidLimit)?;

        Ok(PostListQuery {
            filter,
            sort,
            page: PageRequest::new(page, limit, config),
        })
    }
}

/// Integers beyond `i64` saturate, so a huge page is simply past the end and a
/// huge limit is capped like any other.
fn parse_int(
    value: Option<&str>,
    error: fn(String) -> QueryError,
) -> Result<Option<i64>, QueryError> {
    non_blank(value)
        .map(|value| match value.parse::<i64>() {
            Ok(value) => Ok(value),
            Err(err) => match err.kind() {
                IntErrorKind::PosOverflow => Ok(i64::MAX),
                IntErrorKind::NegOverflow => Ok(i64::MIN),
                _ => Err(error(value.to_owned())),
            },
        })
        .transpose()
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum PostSort {
    /// Creation time, newest first.
    #[default]
    Newest,
    /// Comment count, highest first, then newest first.
    Popular,
}

impl PostSort {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PostSort::Newest => "new",
            PostSort::Popular => "popular",
        }
    }

    /// Total order on posts. Ends with the id, so equal timestamps stay stable.
    #[must_use]
    pub fn compare(self, a: &Post, b: &Post) -> Ordering {
        let newest_first = b
            .created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id));

        match self {
            PostSort::Newest => newest_first,
            PostSort::Popular => b.comment_count.cmp(&a.comment_count).then(newest_first),
        }
    }
}

impl FromStr for PostSort {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "new" | "newest" => Ok(PostSort::Newest),
            "popular" => Ok(PostSort::Popular),
            _ => Err(QueryError::UnknownSort(s.to_owned())),
        }
    }
}

/// Filters of a listing. `None` matches every post.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostFilter {
    /// Exact, case-sensitive tag membership.
    pub tag: Option<String>,
    pub author: Option<Id<UserMarker>>,
    /// Case-insensitive literal substring of the title.
    pub title: Option<String>,
}

impl PostFilter {
    #[must_use]
    pub fn matches(&self, post: &Post) -> bool {
        self.tag.as_deref().is_none_or(|tag| post.has_tag(tag))
            && self.author.is_none_or(|author| post.author.id == author)
            && self.title.as_deref().is_none_or(|title| {
                post.title
                    .get()
                    .to_lowercase()
                    .contains(&title.to_lowercase())
            })
    }

    /// `title` as an `ILIKE` pattern with `\` as the escape character.
    #[must_use]
    pub fn title_like_pattern(&self) -> Option<String> {
        self.title.as_deref().map(|title| {
            let mut pattern = String::with_capacity(title.len() + 2);
            pattern.push('%');
            for c in title.chars() {
                if matches!(c, '%' | '_' | '\\') {
                    pattern.push('\\');
                }
                pattern.push(c);
            }
            pattern.push('%');
            pattern
        })
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Pages below 1 become page 1; a missing or non-positive limit becomes the
    /// default page size and larger limits are capped at the maximum.
    #[must_use]
    pub fn new(page: Option<i64>, limit: Option<i64>, config: PaginationConfig) -> Self {
        let page = page
            .filter(|page| *page > 1)
            .map_or(1, |page| u32::try_from(page).unwrap_or(u32::MAX));
        let limit = limit
            .filter(|limit| *limit > 0)
            .map_or(config.default_page_size, |limit| {
                u32::try_from(limit).unwrap_or(u32::MAX)
            })
            .min(config.max_page_size);

        Self { page, limit }
    }

    #[must_use]
    pub fn page(self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn limit(self) -> u32 {
        self.limit
    }

    #[must_use]
    pub fn offset(self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None, PaginationConfig::default())
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostListQuery {
    pub filter: PostFilter,
    pub sort: PostSort,
    pub page: PageRequest,
}

impl PostListQuery {
    /// Evaluates the query over an in-memory collection.
    pub fn apply(&self, posts: impl IntoIterator<Item = Post>) -> PostPage {
        let mut matching: Vec<Post> = posts
            .into_iter()
            .filter(|post| self.filter.matches(post))
            .collect();
        matching.sort_by(|a, b| self.sort.compare(a, b));

        let total_count = matching.len() as u64;
        let offset = usize::try_from(self.page.offset()).unwrap_or(usize::MAX);
        let posts = matching
            .into_iter()
            .skip(offset)
            .take(self.page.limit() as usize)
            .collect();

        PostPage { posts, total_count }
    }
}

/// One page of a listing plus the size of the whole filtered set.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub total_count: u64,
}

impl PostPage {
    #[must_use]
    pub fn page_count(&self, limit: u32) -> u64 {
        self.total_count.div_ceil(u64::from(limit.max(1)))
    }
}
