use crate::client::{DbError, NewUser, Result, UserCredentials};
use parking_lot::Mutex;
use quillpost_common::model::{
    Id,
    auth::{AuthTokenHash, Authentication, PasswordHash},
    comment::{Comment, CommentContent, CommentMarker, CommentText},
    post::{Post, PostContent, PostMarker},
    user::{Email, UpdateProfile, User, UserMarker, UserSummary},
};
use quillpost_common::query::{PostListQuery, PostPage};
use std::collections::{BTreeMap, HashMap};
use time::OffsetDateTime;

#[derive(Clone, Debug)]
struct StoredUser {
    user: User,
    password_hash: PasswordHash,
}

#[derive(Clone, Debug)]
struct StoredPost {
    content: PostContent,
    author: Id<UserMarker>,
    comment_count: u64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
struct StoredComment {
    post_id: Id<PostMarker>,
    author: Id<UserMarker>,
    text: CommentText,
    created_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct Documents {
    users: BTreeMap<Id<UserMarker>, StoredUser>,
    emails: HashMap<Email, Id<UserMarker>>,
    authentications: HashMap<AuthTokenHash, Authentication>,
    posts: BTreeMap<Id<PostMarker>, StoredPost>,
    comments: BTreeMap<Id<CommentMarker>, StoredComment>,
}

/// Process-local backend. Used when no database is configured and by tests.
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    documents: Mutex<Documents>,
}

impl Documents {
    fn summary(&self, user_id: Id<UserMarker>) -> Option<UserSummary> {
        self.users
            .get(&user_id)
            .map(|stored| UserSummary::from(&stored.user))
    }

    fn post(&self, post_id: Id<PostMarker>, stored: &StoredPost) -> Option<Post> {
        Some(Post {
            id: post_id,
            title: stored.content.title.clone(),
            text: stored.content.text.clone(),
            img: stored.content.img.clone(),
            tags: stored.content.tags.clone(),
            author: self.summary(stored.author)?,
            comment_count: stored.comment_count,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    fn comment(&self, comment_id: Id<CommentMarker>, stored: &StoredComment) -> Option<Comment> {
        Some(Comment {
            id: comment_id,
            post_id: stored.post_id,
            author: self.summary(stored.author)?,
            text: stored.text.clone(),
            created_at: stored.created_at,
            updated_at: stored.created_at,
        })
    }

    fn post_has_tag(&self, post_id: Id<PostMarker>, tag: &str) -> bool {
        self.posts
            .get(&post_id)
            .is_some_and(|post| post.content.tags.iter().any(|post_tag| post_tag.get() == tag))
    }
}

impl MemoryStore {
    pub(crate) fn create_user(
        &self,
        id: Id<UserMarker>,
        new_user: &NewUser,
        now: OffsetDateTime,
    ) -> Result<User> {
        let mut documents = self.documents.lock();
        if documents.emails.contains_key(&new_user.email) {
            return Err(DbError::DuplicateEmail);
        }

        let user = User {
            id,
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            avatar: None,
            favorite_comments: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        documents.emails.insert(new_user.email.clone(), id);
        documents.users.insert(
            id,
            StoredUser {
                user: user.clone(),
                password_hash: new_user.password_hash.clone(),
            },
        );

        Ok(user)
    }

    pub(crate) fn fetch_user(&self, user_id: Id<UserMarker>) -> Option<User> {
        let documents = self.documents.lock();
        documents.users.get(&user_id).map(|stored| stored.user.clone())
    }

    pub(crate) fn fetch_credentials(&self, email: &Email) -> Option<UserCredentials> {
        let documents = self.documents.lock();
        let user_id = documents.emails.get(email)?;

        documents.users.get(user_id).map(|stored| UserCredentials {
            user: stored.user.clone(),
            password_hash: stored.password_hash.clone(),
        })
    }

    pub(crate) fn update_user(
        &self,
        user_id: Id<UserMarker>,
        profile: &UpdateProfile,
        now: OffsetDateTime,
    ) -> Option<User> {
        let mut documents = self.documents.lock();
        let stored = documents.users.get_mut(&user_id)?;

        if let Some(name) = &profile.name {
            stored.user.name = name.clone();
        }
        if let Some(avatar) = &profile.avatar {
            stored.user.avatar.clone_from(avatar);
        }
        stored.user.updated_at = now;

        Some(stored.user.clone())
    }

    pub(crate) fn set_favorite_comment(
        &self,
        user_id: Id<UserMarker>,
        comment_id: Id<CommentMarker>,
        favorite: bool,
    ) -> Option<User> {
        let mut documents = self.documents.lock();
        if !documents.comments.contains_key(&comment_id) {
            return None;
        }

        let stored = documents.users.get_mut(&user_id)?;
        let favorites = &mut stored.user.favorite_comments;
        if favorite {
            if !favorites.contains(&comment_id) {
                favorites.push(comment_id);
            }
        } else {
            favorites.retain(|favorite_id| *favorite_id != comment_id);
        }

        Some(stored.user.clone())
    }

    pub(crate) fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        let mut documents = self.documents.lock();
        if !documents.users.contains_key(&authentication.user) {
            return Err(DbError::MissingReference("user"));
        }

        documents
            .authentications
            .insert(authentication.token_hash.clone(), authentication.clone());
        Ok(())
    }

    pub(crate) fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Option<Authentication> {
        self.documents
            .lock()
            .authentications
            .get(token_hash)
            .cloned()
    }

    pub(crate) fn delete_auth(&self, token_hash: &AuthTokenHash) -> bool {
        self.documents
            .lock()
            .authentications
            .remove(token_hash)
            .is_some()
    }

    pub(crate) fn create_post(
        &self,
        id: Id<PostMarker>,
        content: &PostContent,
        author: Id<UserMarker>,
        now: OffsetDateTime,
    ) -> Result<Post> {
        let mut documents = self.documents.lock();
        if !documents.users.contains_key(&author) {
            return Err(DbError::MissingReference("user"));
        }

        let stored = StoredPost {
            content: content.clone(),
            author,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        };
        let post = documents
            .post(id, &stored)
            .ok_or(DbError::MissingReference("user"))?;
        documents.posts.insert(id, stored);

        Ok(post)
    }

    pub(crate) fn fetch_post(&self, post_id: Id<PostMarker>) -> Option<Post> {
        let documents = self.documents.lock();
        let stored = documents.posts.get(&post_id)?;
        documents.post(post_id, stored)
    }

    pub(crate) fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
        now: OffsetDateTime,
    ) -> Option<Post> {
        let mut documents = self.documents.lock();
        let stored = documents.posts.get_mut(&post_id)?;
        stored.content = content.clone();
        stored.updated_at = now;

        let stored = stored.clone();
        documents.post(post_id, &stored)
    }

    pub(crate) fn delete_post(&self, post_id: Id<PostMarker>) -> bool {
        let mut documents = self.documents.lock();
        if documents.posts.remove(&post_id).is_none() {
            return false;
        }

        let Documents {
            users, comments, ..
        } = &mut *documents;
        comments.retain(|comment_id, comment| {
            let keep = comment.post_id != post_id;
            if !keep {
                for stored in users.values_mut() {
                    stored
                        .user
                        .favorite_comments
                        .retain(|favorite_id| favorite_id != comment_id);
                }
            }
            keep
        });

        true
    }

    pub(crate) fn list_posts(&self, query: &PostListQuery) -> PostPage {
        let documents = self.documents.lock();
        let posts = documents
            .posts
            .iter()
            .filter_map(|(post_id, stored)| documents.post(*post_id, stored));

        query.apply(posts)
    }

    pub(crate) fn create_comment(
        &self,
        id: Id<CommentMarker>,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        content: &CommentContent,
        now: OffsetDateTime,
    ) -> Result<Option<Comment>> {
        let mut documents = self.documents.lock();
        if !documents.posts.contains_key(&post_id) {
            return Ok(None);
        }
        if !documents.users.contains_key(&author) {
            return Err(DbError::MissingReference("user"));
        }
        if let Some(post) = documents.posts.get_mut(&post_id) {
            post.comment_count += 1;
        }

        let stored = StoredComment {
            post_id,
            author,
            text: content.text.clone(),
            created_at: now,
        };
        let comment = documents.comment(id, &stored);
        documents.comments.insert(id, stored);

        Ok(comment)
    }

    pub(crate) fn list_post_comments(&self, post_id: Id<PostMarker>) -> Option<Vec<Comment>> {
        let documents = self.documents.lock();
        if !documents.posts.contains_key(&post_id) {
            return None;
        }

        let mut comments: Vec<Comment> = documents
            .comments
            .iter()
            .filter(|(_, stored)| stored.post_id == post_id)
            .filter_map(|(comment_id, stored)| documents.comment(*comment_id, stored))
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Some(comments)
    }

    pub(crate) fn list_latest_comments(&self, tag: Option<&str>, limit: u32) -> Vec<Comment> {
        let documents = self.documents.lock();

        let mut comments: Vec<Comment> = documents
            .comments
            .iter()
            .filter(|(_, stored)| tag.is_none_or(|tag| documents.post_has_tag(stored.post_id, tag)))
            .filter_map(|(comment_id, stored)| documents.comment(*comment_id, stored))
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        comments.truncate(limit as usize);

        comments
    }

    pub(crate) fn list_tags(&self, tag: Option<&str>, limit: u32) -> Vec<String> {
        let documents = self.documents.lock();

        let mut counts: HashMap<&str, u64> = HashMap::new();
        for post in documents.posts.values() {
            let tags = &post.content.tags;
            if let Some(tag) = tag
                && !tags.iter().any(|post_tag| post_tag.get() == tag)
            {
                continue;
            }

            for post_tag in tags {
                if Some(post_tag.get()) != tag {
                    *counts.entry(post_tag.get()).or_default() += 1;
                }
            }
        }

        let mut counts: Vec<(&str, u64)> = counts.into_iter().collect();
        counts.sort_by(|(a_tag, a_count), (b_tag, b_count)| {
            b_count.cmp(a_count).then_with(|| a_tag.cmp(b_tag))
        });

        counts
            .into_iter()
            .take(limit as usize)
            .map(|(tag, _)| tag.to_owned())
            .collect()
    }
}
