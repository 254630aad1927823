#![allow(dead_code)]

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use image::{ImageFormat, Rgb, RgbImage};
use mm_auth_simple::SimpleIdentityProvider;
use mm_core::models::UserId;
use mm_core::{DocumentStore, ManualClock, SignInProvider};
use mm_db_memory::MemoryDocumentStore;
use mm_db_sqlite::SqliteDocumentStore;
use mm_services::Services;
use mm_storage_local::LocalObjectStore;
use secrecy::SecretString;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy)]
pub enum Backend {
    Memory,
    /// Memory store that caps `In` filters, as hosted document stores do
    CappedMemory,
    Sqlite,
}

pub const ALL_BACKENDS: [Backend; 3] = [Backend::Memory, Backend::CappedMemory, Backend::Sqlite];

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

pub struct Harness {
    pub services: Services,
    pub store: Arc<dyn DocumentStore>,
    pub clock: Arc<ManualClock>,
    pub media: TempDir,
}

impl Harness {
    pub async fn new(backend: Backend) -> Self {
        let store: Arc<dyn DocumentStore> = match backend {
            Backend::Memory => Arc::new(MemoryDocumentStore::new()),
            Backend::CappedMemory => Arc::new(MemoryDocumentStore::with_membership_limit(3)),
            Backend::Sqlite => Arc::new(
                SqliteDocumentStore::new("sqlite::memory:", 1)
                    .await
                    .expect("open sqlite"),
            ),
        };
        let media = tempfile::tempdir().expect("media dir");
        let objects = Arc::new(LocalObjectStore::new(
            media.path().to_path_buf(),
            "/static/uploads".into(),
        ));
        let identity = Arc::new(SimpleIdentityProvider::new(SecretString::from(
            "integration-salt".to_string(),
        )));
        let clock = Arc::new(ManualClock::new(t0()));
        let services = Services::new(store.clone(), objects, identity, clock.clone());
        Self {
            services,
            store,
            clock,
            media,
        }
    }

    /// Signs `subject` in with Apple and claims `nickname` for them.
    pub async fn sign_up(&self, subject: &str, nickname: &str) -> UserId {
        let (profile, _) = self
            .services
            .session
            .sign_in(SignInProvider::Apple, subject)
            .await
            .expect("sign in");
        self.services
            .profiles
            .claim_nickname(&profile.id, nickname)
            .await
            .expect("claim nickname");
        profile.id
    }

    /// Makes `a` and `b` friends through the request flow.
    pub async fn befriend(&self, a: &UserId, b: &UserId) {
        let rel = &self.services.relationships;
        rel.send_request(a, b).await.expect("send request");
        rel.accept_request(b, a).await.expect("accept request");
    }
}

pub fn png_bytes() -> Bytes {
    let img = RgbImage::from_pixel(320, 320, Rgb([250, 180, 20]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).expect("encode png");
    Bytes::from(buf.into_inner())
}
