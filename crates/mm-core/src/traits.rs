//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use crate::document::{Document, FieldUpdates, Filter, WriteOp};
use crate::error::StoreResult;
use crate::models::UserId;
use async_trait::async_trait;
use bytes::Bytes;
use mime::Mime;
use std::fmt;
use std::str::FromStr;

/// Generic document persistence: records keyed by id inside named collections.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_record(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Returns `(id, body)` pairs matching every filter, in no particular order.
    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> StoreResult<Vec<(String, Document)>>;

    /// Applies all writes or none of them.
    async fn commit_batch(&self, writes: Vec<WriteOp>) -> StoreResult<()>;

    /// Largest value list an `In` filter may carry, if the backend caps it.
    fn membership_limit(&self) -> Option<usize> {
        None
    }

    /// Create-if-absent. Fails with `StoreError::AlreadyExists` otherwise.
    async fn create_record(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()> {
        self.commit_batch(vec![WriteOp::create(collection, id, fields)])
            .await
    }

    async fn set_record(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        merge: bool,
    ) -> StoreResult<()> {
        self.commit_batch(vec![WriteOp::set(collection, id, fields, merge)])
            .await
    }

    /// Fails with `StoreError::Missing` when the record does not exist.
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        updates: FieldUpdates,
    ) -> StoreResult<()> {
        self.commit_batch(vec![WriteOp::update(collection, id, updates)])
            .await
    }
}

/// Location of an uploaded object inside an `ObjectStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub path: String,
}

/// Blob storage for avatars.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores bytes at `path`, replacing any previous object.
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &Mime,
    ) -> anyhow::Result<ObjectHandle>;

    /// Handle for an existing object, or `None` when nothing was uploaded there.
    async fn find(&self, path: &str) -> anyhow::Result<Option<ObjectHandle>>;

    async fn public_url(&self, handle: &ObjectHandle) -> anyhow::Result<String>;
}

/// Federated sign-in backends accepted by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignInProvider {
    Apple,
    Google,
}

impl SignInProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignInProvider::Apple => "apple",
            SignInProvider::Google => "google",
        }
    }
}

impl fmt::Display for SignInProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignInProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "apple" => Ok(SignInProvider::Apple),
            "google" => Ok(SignInProvider::Google),
            other => Err(format!("unknown sign-in provider: {other}")),
        }
    }
}

/// Identity contract: who is signed in on this device.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_session(&self) -> anyhow::Result<Option<UserId>>;

    /// Signs in with `subject`, the provider-issued account identifier.
    async fn sign_in(&self, provider: SignInProvider, subject: &str) -> anyhow::Result<UserId>;

    async fn sign_out(&self) -> anyhow::Result<()>;
}
