use std::sync::{Arc, Mutex};

use crate::api::LikeApi;
use crate::error::{BlogError, BlogResult};
use crate::models::{Id, LikeResponse, Post};
use crate::optimistic::{MutationCoordinator, Outcome};
use crate::session::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeState {
    pub is_liked: bool,
    pub like_count: u64,
}

impl LikeState {
    pub fn for_post(post: &Post, identity: Option<&Identity>) -> Self {
        Self {
            is_liked: identity.is_some_and(|identity| liked_by(identity, &post.liked_by)),
            like_count: post.like_count,
        }
    }

    /// The guess applied while a toggle is in flight.
    pub fn toggled(&self) -> Self {
        Self {
            is_liked: !self.is_liked,
            like_count: if self.is_liked {
                self.like_count.saturating_sub(1)
            } else {
                self.like_count + 1
            },
        }
    }

    pub fn from_server(response: &LikeResponse, identity: &Identity) -> Self {
        Self {
            is_liked: liked_by(identity, &response.liked_by),
            like_count: response.like_count,
        }
    }
}

/// The server records likes under the username in the token, which is the
/// original one until the user logs in again after a rename.
fn liked_by<'a>(identity: &Identity, names: impl IntoIterator<Item = &'a String>) -> bool {
    names
        .into_iter()
        .any(|name| *name == identity.current_username || *name == identity.original_username)
}

/// Like button state for one post, readable while a toggle is in flight.
#[derive(Debug)]
pub struct LikeView {
    post_id: Id,
    state: Mutex<LikeState>,
}

impl LikeView {
    pub fn new(post: &Post, identity: Option<&Identity>) -> Self {
        Self {
            post_id: post.id.clone(),
            state: Mutex::new(LikeState::for_post(post, identity)),
        }
    }

    pub fn post_id(&self) -> &Id {
        &self.post_id
    }

    pub fn state(&self) -> LikeState {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Runs like toggles through the optimistic protocol, one at a time per post.
pub struct LikeCoordinator<A> {
    api: Arc<A>,
    mutations: MutationCoordinator<Id>,
}

impl<A: LikeApi> LikeCoordinator<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            mutations: MutationCoordinator::new(),
        }
    }

    pub fn is_in_flight(&self, post_id: &Id) -> bool {
        self.mutations.is_in_flight(post_id)
    }

    /// Flip the like on `view`. The guess shows immediately; the server's
    /// `likedBy`/`likeCount` replace it on success, and the prior state comes
    /// back on failure.
    pub async fn toggle_like(
        &self,
        view: &LikeView,
        identity: Option<&Identity>,
    ) -> BlogResult<LikeState> {
        let identity =
            identity.ok_or_else(|| BlogError::Permission("Please login to like posts".to_string()))?;

        let pending = self
            .mutations
            .begin(view.post_id.clone(), &view.state, LikeState::toggled)?;
        let was_liked = pending.prior().is_liked;

        let result = self
            .api
            .toggle_like(&view.post_id)
            .await
            .map(|response| LikeState::from_server(&response, identity));

        match pending.resolve(result) {
            Outcome::Confirmed(state) => {
                tracing::debug!(
                    "Post {} like confirmed: liked={} count={}",
                    view.post_id,
                    state.is_liked,
                    state.like_count
                );
                Ok(state)
            }
            Outcome::RolledBack { error, .. } => {
                tracing::warn!(
                    "Failed to {} post {}: {}",
                    if was_liked { "unlike" } else { "like" },
                    view.post_id,
                    error
                );
                Err(error)
            }
        }
    }
}
