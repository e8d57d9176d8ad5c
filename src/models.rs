use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Server-assigned identifier. The API hands these out as numbers or
/// strings depending on the resource, so both are accepted and kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
pub struct Id(pub String);

impl Id {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Id(s),
            Raw::Int(n) => Id(n.to_string()),
            Raw::Float(n) => Id(n.to_string()),
        })
    }
}

/// Missing or malformed timestamps sort as the oldest possible instant.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// First id present among keys the API may send side by side, in priority
/// order. Empty strings count as absent.
fn first_id<const N: usize>(candidates: [Option<Id>; N]) -> Option<Id> {
    candidates
        .into_iter()
        .flatten()
        .find(|id| !id.as_str().is_empty())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "PostWire")]
pub struct Post {
    pub id: Id,
    pub title: String,
    pub desc: String,
    pub photo: Option<String>,
    pub categories: BTreeSet<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub owner_username: String,
    pub like_count: u64,
    pub liked_by: BTreeSet<String>,
    pub comment_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostWire {
    #[serde(default)]
    postid: Option<Id>,
    #[serde(default)]
    id: Option<Id>,
    #[serde(default, rename = "_id")]
    underscore_id: Option<Id>,
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    desc: String,
    #[serde(default)]
    photo: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    categories: BTreeSet<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    like_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    liked_by: BTreeSet<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    comment_count: u64,
}

impl TryFrom<PostWire> for Post {
    type Error = String;

    fn try_from(wire: PostWire) -> Result<Self, Self::Error> {
        let id = first_id([wire.postid, wire.id, wire.underscore_id])
            .ok_or_else(|| "post without postid".to_string())?;
        Ok(Self {
            id,
            title: wire.title,
            desc: wire.desc,
            photo: wire.photo,
            categories: wire.categories,
            created_at: wire.created_at,
            owner_username: wire.username,
            like_count: wire.like_count,
            liked_by: wire.liked_by,
            comment_count: wire.comment_count,
        })
    }
}

impl Post {
    pub fn created_at_or_min(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "CommentWire")]
pub struct Comment {
    pub id: Id,
    pub postid: Id,
    pub username: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentWire {
    #[serde(default)]
    commentid: Option<Id>,
    #[serde(default)]
    id: Option<Id>,
    #[serde(default, rename = "_id")]
    underscore_id: Option<Id>,
    postid: Id,
    #[serde(default)]
    username: String,
    #[serde(default)]
    text: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
}

impl TryFrom<CommentWire> for Comment {
    type Error = String;

    fn try_from(wire: CommentWire) -> Result<Self, Self::Error> {
        let id = first_id([wire.commentid, wire.id, wire.underscore_id])
            .ok_or_else(|| "comment without commentid".to_string())?;
        Ok(Self {
            id,
            postid: wire.postid,
            username: wire.username,
            text: wire.text,
            created_at: wire.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "CategoryWire")]
pub struct Category {
    pub id: Id,
    pub name: String,
    pub post_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryWire {
    #[serde(default)]
    categoryid: Option<Id>,
    #[serde(default)]
    categoriesid: Option<Id>,
    #[serde(default, rename = "_id")]
    underscore_id: Option<Id>,
    #[serde(default)]
    id: Option<Id>,
    name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    post_count: u64,
}

impl TryFrom<CategoryWire> for Category {
    type Error = String;

    fn try_from(wire: CategoryWire) -> Result<Self, Self::Error> {
        let id = first_id([
            wire.categoryid,
            wire.categoriesid,
            wire.underscore_id,
            wire.id,
        ])
        .ok_or_else(|| format!("category {:?} without categoryid", wire.name))?;
        Ok(Self {
            id,
            name: wire.name,
            post_count: wire.post_count,
        })
    }
}

/// User as the server sends it. Field names and the admin flag vary between
/// endpoints; `session::normalize` folds them into an `Identity`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "ServerUserWire")]
pub struct ServerUser {
    /// `id`, else `userid`, else `_id`.
    pub id: Id,
    pub username: String,
    pub email: Option<String>,
    pub profile_pic: Option<String>,
    pub bio: Option<String>,
    pub is_admin: Option<bool>,
    /// The lowercase `isadmin` some endpoints send.
    pub is_admin_lower: Option<bool>,
    pub role: Option<String>,
    /// Present on persisted records only.
    pub token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerUserWire {
    #[serde(default)]
    id: Option<Id>,
    #[serde(default)]
    userid: Option<Id>,
    #[serde(default, rename = "_id")]
    underscore_id: Option<Id>,
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    profile_pic: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    is_admin: Option<bool>,
    #[serde(default, rename = "isadmin")]
    is_admin_lower: Option<bool>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

impl From<ServerUserWire> for ServerUser {
    fn from(wire: ServerUserWire) -> Self {
        Self {
            id: first_id([wire.id, wire.userid, wire.underscore_id]).unwrap_or_default(),
            username: wire.username,
            email: wire.email,
            profile_pic: wire.profile_pic,
            bio: wire.bio,
            is_admin: wire.is_admin,
            is_admin_lower: wire.is_admin_lower,
            role: wire.role,
            token: wire.token,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: ServerUser,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub like_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub liked_by: BTreeSet<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub profile_pic: &'a str,
    pub created_at: DateTime<Utc>,
}

/// Body for `PUT /users/:id`. Only the fields being changed are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// Body for `DELETE /users/:id`; the server checks it against the token.
#[derive(Debug, Clone, Serialize)]
pub struct AccountDeletion<'a> {
    pub username: &'a str,
}

/// Title, body and categories of a post being written or edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostDraft {
    pub title: String,
    pub desc: String,
    pub categories: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComment<'a> {
    pub postid: &'a Id,
    pub text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCategory<'a> {
    pub name: &'a str,
}
