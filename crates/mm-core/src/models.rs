//! # Domain Models
//!
//! These structs represent the records memeow keeps in the document store.
//! Timestamps are persisted as epoch milliseconds so range filters compare numerically.

use crate::document::Document;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, ser::Error as _, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Collection names in the document store.
pub mod collections {
    pub const USERS: &str = "users";
    pub const NICKNAMES: &str = "nicknames";
    pub const NOTES: &str = "statuses";
}

/// Field names shared by queries and field updates.
pub mod fields {
    pub const NICKNAME: &str = "nickname";
    pub const AVATAR_URL: &str = "avatarUrl";
    pub const FRIENDS: &str = "friends";
    pub const REQUESTS_SENT: &str = "friendRequestsSent";
    pub const REQUESTS_RECEIVED: &str = "friendRequestsReceived";
    pub const LAST_POST_TIME: &str = "lastPostTime";
    pub const OWNER_ID: &str = "ownerId";
    pub const CREATED_AT: &str = "createdAt";
}

/// Opaque identifier issued by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&UserId> for Value {
    fn from(id: &UserId) -> Self {
        Value::String(id.0.clone())
    }
}

/// A user record. The three relationship sets mirror the other party's sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Document id; not stored in the body
    #[serde(skip)]
    pub id: UserId,
    /// Claimed once, never changed afterwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub friends: BTreeSet<UserId>,
    #[serde(default)]
    pub friend_requests_sent: BTreeSet<UserId>,
    #[serde(default)]
    pub friend_requests_received: BTreeSet<UserId>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_post_time: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// A fresh record with empty relationship sets.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn from_document(id: UserId, doc: Document) -> serde_json::Result<Self> {
        let mut profile: UserProfile = from_document(doc)?;
        profile.id = id;
        Ok(profile)
    }

    /// Derives the relationship from this user's point of view.
    ///
    /// Checks friends first, then sent, then received, so a record that
    /// violates the pairwise invariant still yields a single answer.
    pub fn status_toward(&self, other: &UserId) -> RelationshipStatus {
        if self.friends.contains(other) {
            RelationshipStatus::Friends
        } else if self.friend_requests_sent.contains(other) {
            RelationshipStatus::RequestSent
        } else if self.friend_requests_received.contains(other) {
            RelationshipStatus::RequestReceived
        } else {
            RelationshipStatus::None
        }
    }

    pub fn has_nickname(&self) -> bool {
        self.nickname.is_some()
    }
}

/// Pairwise friend status seen from the viewer's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipStatus {
    None,
    /// Viewer asked the subject; awaiting their answer
    RequestSent,
    /// Subject asked the viewer
    RequestReceived,
    Friends,
}

impl RelationshipStatus {
    /// The same relationship seen from the other party.
    pub fn mirrored(self) -> Self {
        match self {
            RelationshipStatus::RequestSent => RelationshipStatus::RequestReceived,
            RelationshipStatus::RequestReceived => RelationshipStatus::RequestSent,
            other => other,
        }
    }
}

impl fmt::Display for RelationshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RelationshipStatus::None => "none",
            RelationshipStatus::RequestSent => "request sent",
            RelationshipStatus::RequestReceived => "request received",
            RelationshipStatus::Friends => "friends",
        };
        f.write_str(label)
    }
}

/// Uniqueness index entry: nickname (document id) to owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NicknameReservation {
    pub uid: UserId,
}

/// A short-lived text post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(skip)]
    pub id: String,
    pub owner_id: UserId,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Copied from the owner when the note was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Note {
    pub fn from_document(id: impl Into<String>, doc: Document) -> serde_json::Result<Self> {
        let mut note: Note = from_document(doc)?;
        note.id = id.into();
        Ok(note)
    }
}

/// Serializes a model into a document body.
pub fn to_document<T: Serialize>(value: &T) -> serde_json::Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(serde_json::Error::custom(format!(
            "expected an object, got {other}"
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> serde_json::Result<T> {
    serde_json::from_value(Value::Object(doc))
}
