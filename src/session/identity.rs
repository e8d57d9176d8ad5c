use serde::{Deserialize, Serialize};

use crate::models::{Id, ServerUser};

/// The signed-in user as the client tracks it.
///
/// `original_username` is the name the user had when this identity was first
/// built. Posts written before a rename are still stored under that name and
/// the bearer token keeps carrying it until the next login, so ownership is
/// checked against both names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Id,
    #[serde(rename = "username")]
    pub current_username: String,
    pub original_username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub profile_pic: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub is_admin: bool,
    pub token: String,
}

impl Identity {
    pub fn has_renamed(&self) -> bool {
        self.original_username != self.current_username
    }

    /// Usernames that content owned by this identity may be filed under,
    /// original first, without duplicates.
    pub fn usernames(&self) -> Vec<String> {
        let mut names = vec![self.original_username.clone()];
        if self.has_renamed() {
            names.push(self.current_username.clone());
        }
        names
    }
}

/// Fields a settings change may touch. `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub profile_pic: Option<String>,
    pub bio: Option<String>,
}

/// Fold a server user into an `Identity`.
///
/// The admin flag is read from `isAdmin`, then `isadmin`, then
/// `role == "admin"`, defaulting to false. `original_username` is inherited
/// from `existing` when there is one; otherwise it starts as the server's
/// username.
pub fn normalize(user: &ServerUser, token: &str, existing: Option<&Identity>) -> Identity {
    let is_admin = user
        .is_admin
        .or(user.is_admin_lower)
        .or_else(|| (user.role.as_deref() == Some("admin")).then_some(true))
        .unwrap_or(false);

    let bio = user
        .bio
        .clone()
        .filter(|b| !b.is_empty())
        .or_else(|| existing.map(|e| e.bio.clone()))
        .unwrap_or_default();

    let original_username = existing
        .map(|e| e.original_username.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| user.username.clone());

    Identity {
        id: user.id.clone(),
        current_username: user.username.clone(),
        original_username,
        email: user.email.clone().unwrap_or_default(),
        profile_pic: user.profile_pic.clone().unwrap_or_default(),
        bio,
        is_admin,
        token: token.to_string(),
    }
}

/// Merge a settings change into `existing`. The original username is carried
/// over unchanged, falling back to the current one if it was never set.
pub fn apply_update(existing: &Identity, update: IdentityUpdate) -> Identity {
    let original_username = if existing.original_username.is_empty() {
        existing.current_username.clone()
    } else {
        existing.original_username.clone()
    };

    Identity {
        id: existing.id.clone(),
        current_username: update
            .username
            .unwrap_or_else(|| existing.current_username.clone()),
        original_username,
        email: update.email.unwrap_or_else(|| existing.email.clone()),
        profile_pic: update
            .profile_pic
            .unwrap_or_else(|| existing.profile_pic.clone()),
        bio: update.bio.unwrap_or_else(|| existing.bio.clone()),
        is_admin: existing.is_admin,
        token: existing.token.clone(),
    }
}
