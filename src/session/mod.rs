mod active;
mod identity;
mod record;

use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{BlogError, BlogResult, ValidationError};
use crate::gateway::Gateway;
use crate::models::UserChanges;

pub use self::active::ActiveSession;
pub use self::identity::{apply_update, normalize, Identity, IdentityUpdate};
pub use self::record::SessionRecord;

/// Where the UI should go after a session change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
}

/// Changes requested from the settings screen.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub profile_pic: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub identity: Identity,
    /// The token still carries the old name until the next login, so the
    /// caller should suggest logging out and back in.
    pub username_changed: bool,
}

/// Owns the signed-in identity: restores it at startup, creates it on login,
/// rewrites it on settings changes and drops it on logout.
pub struct SessionStore {
    gateway: Gateway,
    active: Arc<ActiveSession>,
    routes: watch::Sender<Route>,
}

impl SessionStore {
    pub fn new(gateway: Gateway) -> Self {
        let active = gateway.session().clone();
        let (routes, _) = watch::channel(Route::Home);
        Self {
            gateway,
            active,
            routes,
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.active.current()
    }

    pub fn active(&self) -> &Arc<ActiveSession> {
        &self.active
    }

    pub fn subscribe_routes(&self) -> watch::Receiver<Route> {
        self.routes.subscribe()
    }

    /// Restore the persisted identity, if any. An unreadable record is
    /// deleted and the store starts signed out.
    pub fn load(&self) -> Option<Identity> {
        let identity = match self.active.record().load() {
            Ok(Some(identity)) => identity,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!("Could not read session record: {}", e);
                if let Err(e) = self.active.record().remove() {
                    tracing::debug!("Could not remove session record: {}", e);
                }
                return None;
            }
        };

        if let Err(e) = self.active.activate(identity.clone()) {
            tracing::warn!("Could not rewrite session record: {}", e);
            self.active.restore(identity.clone());
        }
        tracing::info!("Restored session for {}", identity.current_username);
        Some(identity)
    }

    pub async fn login(&self, username: &str, password: &str) -> BlogResult<Identity> {
        let response = self
            .gateway
            .login(username, password)
            .await
            .map_err(|e| auth_error(e, "Login failed"))?;

        // A fresh login resets the original username to whatever the token
        // now carries.
        let identity = normalize(&response.user, &response.token, None);
        self.active.activate(identity.clone())?;
        tracing::info!(
            "Signed in as {} (admin: {})",
            identity.current_username,
            identity.is_admin
        );

        self.routes.send_replace(Route::Home);
        Ok(identity)
    }

    /// Register, then log in with the same credentials.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> BlogResult<Identity> {
        self.gateway
            .register(username, email, password)
            .await
            .map_err(|e| auth_error(e, "Registration failed"))?;
        tracing::info!("Registered {}", username);

        self.login(username, password).await
    }

    /// Merge `update` into the active identity and persist it.
    pub fn update(&self, update: IdentityUpdate) -> BlogResult<Identity> {
        let existing = self
            .active
            .current()
            .ok_or_else(|| BlogError::Permission("Not signed in".to_string()))?;

        let updated = apply_update(&existing, update);
        self.active.activate(updated.clone())?;
        Ok(updated)
    }

    /// The settings flow: check the new username is free, send the changed
    /// fields, then fold the server's answer into the identity.
    pub async fn update_profile(&self, changes: ProfileChanges) -> BlogResult<ProfileUpdate> {
        let existing = self
            .active
            .current()
            .ok_or_else(|| BlogError::Permission("Please login to update your profile".to_string()))?;

        let new_username = changes
            .username
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty() && *name != existing.current_username);

        if let Some(ref name) = new_username {
            match self.gateway.username_taken(name, &existing.id).await {
                Ok(true) => return Err(ValidationError::UsernameTaken.into()),
                Ok(false) => {}
                // The server validates again on update.
                Err(e) => tracing::warn!("Username availability check failed: {}", e),
            }
        }

        let body = UserChanges {
            username: new_username,
            email: changes.email.filter(|email| *email != existing.email),
            password: changes.password.filter(|password| !password.trim().is_empty()),
            profile_pic: changes.profile_pic.filter(|pic| *pic != existing.profile_pic),
            bio: changes.bio.filter(|bio| *bio != existing.bio),
        };

        let server_user = self.gateway.update_user(&existing.id, &body).await?;

        let username_changed =
            !server_user.username.is_empty() && server_user.username != existing.current_username;
        let identity = self.update(IdentityUpdate {
            username: Some(server_user.username).filter(|name| !name.is_empty()),
            email: server_user.email,
            profile_pic: server_user.profile_pic,
            bio: server_user.bio.or(body.bio),
        })?;

        if username_changed {
            tracing::info!(
                "Username changed from {} to {}; token still carries {}",
                existing.current_username,
                identity.current_username,
                identity.original_username
            );
        }

        Ok(ProfileUpdate {
            identity,
            username_changed,
        })
    }

    /// Delete the signed-in account on the server, then sign out. The
    /// session is left untouched if the server refuses.
    pub async fn delete_account(&self) -> BlogResult<()> {
        let existing = self.active.current().ok_or_else(|| {
            BlogError::Permission("Please login to delete your account".to_string())
        })?;

        self.gateway
            .delete_user(&existing.id, &existing.current_username)
            .await?;
        tracing::info!("Deleted account {}", existing.current_username);

        self.logout()
    }

    pub fn logout(&self) -> BlogResult<()> {
        self.active.clear()?;
        tracing::info!("Signed out");
        self.routes.send_replace(Route::Login);
        Ok(())
    }
}

/// Login and registration failures surface as `Auth` with the server's
/// message when it sent one.
fn auth_error(err: BlogError, default: &str) -> BlogError {
    let message = match &err {
        BlogError::Status { message, .. }
        | BlogError::Permission(message)
        | BlogError::Unauthorized(message)
        | BlogError::Auth(message) => message.clone(),
        _ => String::new(),
    };

    if message.is_empty() {
        tracing::debug!("{} without server message: {}", default, err);
        BlogError::Auth(default.to_string())
    } else {
        BlogError::Auth(message)
    }
}
