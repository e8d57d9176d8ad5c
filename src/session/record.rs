use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::BlogResult;
use crate::models::ServerUser;
use crate::session::identity::{normalize, Identity};

/// The signed-in identity as stored on disk, token included.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    path: PathBuf,
}

/// The bits of a stored record that `normalize` inherits from.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredExtras {
    #[serde(default)]
    original_username: Option<String>,
    #[serde(default)]
    bio: Option<String>,
}

impl SessionRecord {
    pub fn new(data_dir: &Path, file_name: &str) -> Self {
        Self {
            path: data_dir.join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and re-normalize the stored identity.
    ///
    /// A record that can't be parsed (or has no token) is deleted and
    /// treated as signed out.
    pub fn load(&self) -> BlogResult<Option<Identity>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match parse_record(&json) {
            Some(identity) => Ok(Some(identity)),
            None => {
                tracing::debug!("Discarding unreadable session record {}", self.path.display());
                self.remove()?;
                Ok(None)
            }
        }
    }

    pub fn save(&self, identity: &Identity) -> BlogResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(identity)?)?;
        Ok(())
    }

    pub fn remove(&self) -> BlogResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_record(json: &str) -> Option<Identity> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    let user: ServerUser = serde_json::from_value(value.clone()).ok()?;
    let extras: StoredExtras = serde_json::from_value(value).ok()?;
    let token = user.token.clone().filter(|t| !t.is_empty())?;
    if user.username.is_empty() {
        return None;
    }

    // Only the inherited fields matter here; the rest comes from `user`.
    let existing = Identity {
        id: user.id.clone(),
        current_username: user.username.clone(),
        original_username: extras.original_username.unwrap_or_default(),
        email: String::new(),
        profile_pic: String::new(),
        bio: extras.bio.unwrap_or_default(),
        is_admin: false,
        token: token.clone(),
    };
    Some(normalize(&user, &token, Some(&existing)))
}
