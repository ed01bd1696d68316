use serde::{Deserialize, Serialize};

/// Author identity handed to the tracked-changes layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            image: None,
        }
    }
}

/// Replay settings.
///
/// The replay itself never interprets the user; when `track_changes` is set
/// it is attached to the transaction under [`ReplayOptions::META_KEY`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplayOptions {
    pub track_changes: bool,
    pub user: Option<User>,
}

impl ReplayOptions {
    /// Transaction metadata key read by the tracked-changes wrapper.
    pub const META_KEY: &'static str = "trackChanges";

    /// Options that request tracked changes attributed to `user`.
    pub fn tracked(user: User) -> Self {
        Self {
            track_changes: true,
            user: Some(user),
        }
    }
}
