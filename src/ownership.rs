use crate::models::Comment;
use crate::session::Identity;

/// How a 403 should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// The user renamed themselves and the token still carries the old name.
    /// Logging in again fixes it.
    StaleToken,
    /// The action is not allowed.
    Forbidden,
}

/// Whether `identity` may edit or delete something filed under
/// `resource_username`.
///
/// The server checks against the username inside the bearer token, which is
/// the pre-rename one until the next login, so both names count.
pub fn is_owner(identity: &Identity, resource_username: &str) -> bool {
    resource_username == identity.current_username
        || resource_username == identity.original_username
}

pub fn is_owned_by(identity: Option<&Identity>, resource_username: &str) -> bool {
    identity.is_some_and(|identity| is_owner(identity, resource_username))
}

pub fn classify_auth_failure(status: u16, identity: Option<&Identity>) -> AuthFailure {
    match identity {
        Some(identity) if status == 403 && identity.has_renamed() => AuthFailure::StaleToken,
        _ => AuthFailure::Forbidden,
    }
}

/// Name to show as a resource's author. Content the viewer owns shows their
/// current name even if it was filed under the old one.
pub fn display_username<'a>(identity: Option<&'a Identity>, resource_username: &'a str) -> &'a str {
    match identity {
        Some(identity) if is_owner(identity, resource_username) => &identity.current_username,
        _ => resource_username,
    }
}

pub fn can_delete_comment(identity: Option<&Identity>, comment: &Comment) -> bool {
    is_owned_by(identity, &comment.username)
}
