//! User records, nickname claims and avatars.

use bytes::Bytes;
use mime::Mime;
use mm_core::models::{collections, fields, NicknameReservation, UserId, UserProfile};
use mm_core::{AppError, Document, DocumentStore, ObjectStore, Result, StoreError, WriteOp};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const NICKNAME_MAX_CHARS: usize = 30;

/// Trims and checks a nickname. Nicknames double as document ids, so `/`,
/// `.` and `..` are refused.
pub fn validate_nickname(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::validation("nickname must not be empty"));
    }
    if name.chars().count() > NICKNAME_MAX_CHARS {
        return Err(AppError::validation(format!(
            "nickname must be at most {NICKNAME_MAX_CHARS} characters"
        )));
    }
    if name.contains('/') || name == "." || name == ".." {
        return Err(AppError::validation("nickname contains invalid characters"));
    }
    Ok(name.to_string())
}

/// Storage location of a user's avatar.
pub fn avatar_path(uid: &UserId) -> String {
    format!("avatars/{uid}/avatar.jpg")
}

pub(crate) fn malformed(collection: &str, id: &str, source: serde_json::Error) -> AppError {
    StoreError::Malformed {
        collection: collection.to_string(),
        id: id.to_string(),
        source,
    }
    .into()
}

pub(crate) async fn fetch_user(
    store: &dyn DocumentStore,
    id: &UserId,
) -> Result<Option<UserProfile>> {
    let Some(doc) = store.get_record(collections::USERS, id.as_str()).await? else {
        return Ok(None);
    };
    UserProfile::from_document(id.clone(), doc)
        .map(Some)
        .map_err(|e| malformed(collections::USERS, id.as_str(), e))
}

pub(crate) async fn require_user(store: &dyn DocumentStore, id: &UserId) -> Result<UserProfile> {
    fetch_user(store, id)
        .await?
        .ok_or_else(|| AppError::not_found("user", id.as_str()))
}

/// Resolves a set of ids to profiles, skipping ids without a record.
pub(crate) async fn fetch_users<'a>(
    store: &dyn DocumentStore,
    ids: impl IntoIterator<Item = &'a UserId>,
) -> Result<Vec<UserProfile>> {
    let mut profiles = Vec::new();
    for id in ids {
        match fetch_user(store, id).await? {
            Some(profile) => profiles.push(profile),
            None => debug!(user = %id, "skipping reference to missing user"),
        }
    }
    Ok(profiles)
}

fn empty_relationship_sets() -> Document {
    let mut doc = Document::new();
    for field in [fields::FRIENDS, fields::REQUESTS_SENT, fields::REQUESTS_RECEIVED] {
        doc.insert(field.to_string(), Value::Array(Vec::new()));
    }
    doc
}

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn DocumentStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { store, objects }
    }

    /// Creates the user record on first sign-in and backfills missing set fields.
    #[instrument(skip(self), fields(user = %uid))]
    pub async fn ensure_profile(&self, uid: &UserId) -> Result<UserProfile> {
        let Some(doc) = self.store.get_record(collections::USERS, uid.as_str()).await? else {
            match self
                .store
                .create_record(collections::USERS, uid.as_str(), empty_relationship_sets())
                .await
            {
                Ok(()) => info!("created user record"),
                // Another device created it first; fall through to a fresh read.
                Err(StoreError::AlreadyExists { .. }) => {}
                Err(e) => return Err(e.into()),
            }
            return require_user(self.store.as_ref(), uid).await;
        };

        let missing: Document = empty_relationship_sets()
            .into_iter()
            .filter(|(field, _)| !doc.contains_key(field))
            .collect();
        if !missing.is_empty() {
            debug!(fields = missing.len(), "backfilling relationship sets");
            self.store
                .set_record(collections::USERS, uid.as_str(), missing, true)
                .await?;
        }

        UserProfile::from_document(uid.clone(), doc)
            .map_err(|e| malformed(collections::USERS, uid.as_str(), e))
    }

    pub async fn load_profile(&self, uid: &UserId) -> Result<UserProfile> {
        require_user(self.store.as_ref(), uid).await
    }

    pub async fn find_profile(&self, uid: &UserId) -> Result<Option<UserProfile>> {
        fetch_user(self.store.as_ref(), uid).await
    }

    pub async fn is_nickname_available(&self, raw: &str) -> Result<bool> {
        let name = validate_nickname(raw)?;
        Ok(self
            .store
            .get_record(collections::NICKNAMES, &name)
            .await?
            .is_none())
    }

    /// Reserves `raw` for `uid` and records it on the profile.
    ///
    /// The reservation is create-if-absent and shares a batch with the profile
    /// write, so two concurrent claims cannot both succeed.
    #[instrument(skip(self), fields(user = %uid))]
    pub async fn claim_nickname(&self, uid: &UserId, raw: &str) -> Result<UserProfile> {
        let name = validate_nickname(raw)?;
        let mut profile = require_user(self.store.as_ref(), uid).await?;
        if let Some(existing) = &profile.nickname {
            return Err(AppError::validation(format!(
                "nickname already set to {existing}"
            )));
        }
        if !self.is_nickname_available(&name).await? {
            return Err(AppError::Taken(name));
        }

        let reservation = NicknameReservation { uid: uid.clone() };
        let reservation = mm_core::to_document(&reservation).map_err(AppError::unavailable)?;
        let mut nickname = Document::new();
        nickname.insert(fields::NICKNAME.to_string(), json!(name));

        self.store
            .commit_batch(vec![
                WriteOp::create(collections::NICKNAMES, &name, reservation),
                WriteOp::set(collections::USERS, uid.as_str(), nickname, true),
            ])
            .await?;

        info!(nickname = %name, "nickname claimed");
        profile.nickname = Some(name);
        Ok(profile)
    }

    /// Uploads an avatar image and points the profile at its public URL.
    #[instrument(skip(self, data), fields(user = %uid, bytes = data.len()))]
    pub async fn upload_avatar(
        &self,
        uid: &UserId,
        data: Bytes,
        content_type: &Mime,
    ) -> Result<String> {
        if content_type.type_() != mime::IMAGE {
            return Err(AppError::validation(format!(
                "avatar must be an image, got {content_type}"
            )));
        }
        if data.is_empty() {
            return Err(AppError::validation("avatar file is empty"));
        }
        if image::guess_format(&data).is_err() {
            return Err(AppError::validation("avatar is not a readable image"));
        }
        require_user(self.store.as_ref(), uid).await?;

        let handle = self
            .objects
            .upload(&avatar_path(uid), data, content_type)
            .await
            .map_err(AppError::unavailable)?;
        let url = self
            .objects
            .public_url(&handle)
            .await
            .map_err(AppError::unavailable)?;

        let mut avatar = Document::new();
        avatar.insert(fields::AVATAR_URL.to_string(), json!(url));
        self.store
            .set_record(collections::USERS, uid.as_str(), avatar, true)
            .await?;

        info!("avatar updated");
        Ok(url)
    }

    /// Best-effort avatar lookup. A missing upload, or a failing object store,
    /// reads as "no avatar yet".
    pub async fn avatar_url(&self, uid: &UserId) -> Result<Option<String>> {
        if let Some(url) = require_user(self.store.as_ref(), uid).await?.avatar_url {
            return Ok(Some(url));
        }
        let found = match self.objects.find(&avatar_path(uid)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(user = %uid, error = %format!("{e:#}"), "avatar lookup failed");
                None
            }
        };
        let Some(handle) = found else {
            debug!(user = %uid, "no avatar yet");
            return Ok(None);
        };
        match self.objects.public_url(&handle).await {
            Ok(url) => Ok(Some(url)),
            Err(e) => {
                warn!(user = %uid, error = %format!("{e:#}"), "avatar url unavailable");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_core::MockObjectStore;
    use mm_db_memory::MemoryDocumentStore;

    fn service(objects: MockObjectStore) -> (Arc<MemoryDocumentStore>, ProfileService) {
        let store = Arc::new(MemoryDocumentStore::new());
        (store.clone(), ProfileService::new(store, Arc::new(objects)))
    }

    #[test]
    fn nickname_validation() {
        assert_eq!(validate_nickname("  alice ").unwrap(), "alice");
        assert!(validate_nickname("   ").is_err());
        assert!(validate_nickname("a/b").is_err());
        assert!(validate_nickname("..").is_err());
        assert!(validate_nickname(&"x".repeat(NICKNAME_MAX_CHARS + 1)).is_err());
        assert!(validate_nickname(&"x".repeat(NICKNAME_MAX_CHARS)).is_ok());
    }

    #[tokio::test]
    async fn ensure_profile_creates_then_backfills() {
        let (store, profiles) = service(MockObjectStore::new());
        let uid = UserId::from("u1");

        let created = profiles.ensure_profile(&uid).await.unwrap();
        assert_eq!(created, UserProfile::new(uid.clone()));
        let doc = store.get_record("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc["friendRequestsReceived"], json!([]));

        // A legacy record with only a nickname gets its sets filled in.
        store
            .set_record("users", "u2", mm_core::to_document(&json!({ "nickname": "bo" })).unwrap(), false)
            .await
            .unwrap();
        let legacy = profiles.ensure_profile(&UserId::from("u2")).await.unwrap();
        assert_eq!(legacy.nickname.as_deref(), Some("bo"));
        let doc = store.get_record("users", "u2").await.unwrap().unwrap();
        assert_eq!(doc["friends"], json!([]));
        assert_eq!(doc["nickname"], json!("bo"));
    }

    #[tokio::test]
    async fn nickname_claim_is_one_shot() {
        let (_, profiles) = service(MockObjectStore::new());
        let a = UserId::from("a");
        let b = UserId::from("b");
        profiles.ensure_profile(&a).await.unwrap();
        profiles.ensure_profile(&b).await.unwrap();

        assert!(profiles.is_nickname_available("alice").await.unwrap());
        let claimed = profiles.claim_nickname(&a, " alice ").await.unwrap();
        assert_eq!(claimed.nickname.as_deref(), Some("alice"));
        assert!(!profiles.is_nickname_available("alice").await.unwrap());

        let taken = profiles.claim_nickname(&b, "alice").await.unwrap_err();
        assert!(matches!(taken, AppError::Taken(ref n) if n == "alice"));

        let again = profiles.claim_nickname(&a, "alicia").await.unwrap_err();
        assert!(matches!(again, AppError::ValidationError(_)));
        assert!(profiles.is_nickname_available("alicia").await.unwrap());
    }

    #[tokio::test]
    async fn avatar_upload_records_public_url() {
        let mut objects = MockObjectStore::new();
        objects
            .expect_upload()
            .withf(|path, _, ct| path == "avatars/u1/avatar.jpg" && ct.essence_str() == "image/jpeg")
            .times(1)
            .returning(|path, _, _| {
                Ok(mm_core::ObjectHandle {
                    path: path.to_string(),
                })
            });
        objects
            .expect_public_url()
            .returning(|h| Ok(format!("/static/uploads/{}", h.path)));
        let (_, profiles) = service(objects);
        let uid = UserId::from("u1");
        profiles.ensure_profile(&uid).await.unwrap();

        let url = profiles
            .upload_avatar(&uid, Bytes::from_static(b"\xff\xd8\xff\xe0jpeg"), &mime::IMAGE_JPEG)
            .await
            .unwrap();
        assert_eq!(url, "/static/uploads/avatars/u1/avatar.jpg");
        assert_eq!(profiles.avatar_url(&uid).await.unwrap(), Some(url));
    }

    #[tokio::test]
    async fn avatar_rejects_non_images() {
        let (_, profiles) = service(MockObjectStore::new());
        let uid = UserId::from("u1");
        profiles.ensure_profile(&uid).await.unwrap();
        let err = profiles
            .upload_avatar(&uid, Bytes::from_static(b"hello"), &mime::TEXT_PLAIN)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn corrupt_avatar_bytes_are_a_validation_error() {
        let mut objects = MockObjectStore::new();
        objects.expect_upload().never();
        let (_, profiles) = service(objects);
        let uid = UserId::from("u1");
        profiles.ensure_profile(&uid).await.unwrap();
        let err = profiles
            .upload_avatar(
                &uid,
                Bytes::from_static(b"definitely not a jpeg"),
                &mime::IMAGE_JPEG,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn missing_avatar_is_not_an_error() {
        let mut objects = MockObjectStore::new();
        objects
            .expect_find()
            .returning(|_| Err(anyhow::anyhow!("object does not exist")));
        let (_, profiles) = service(objects);
        let uid = UserId::from("u1");
        profiles.ensure_profile(&uid).await.unwrap();
        assert_eq!(profiles.avatar_url(&uid).await.unwrap(), None);
    }
}
