//! # Note lifecycle
//!
//! Publishing under the posting cooldown, and assembling the friend feed.

use crate::profiles::{fetch_user, malformed, require_user};
use mm_core::lifecycle::{self, PostEligibility};
use mm_core::models::{collections, fields, Note, UserId, UserProfile};
use mm_core::{AppError, Clock, Document, DocumentStore, Filter, Result, WriteOp};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Newest first; ties broken by id so repeated builds agree.
fn sort_newest_first(notes: &mut [Note]) {
    notes.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[derive(Clone)]
pub struct NoteService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl NoteService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn can_post(&self, user: &UserProfile) -> PostEligibility {
        lifecycle::can_post(user.last_post_time, self.clock.now())
    }

    pub fn remaining_visibility(&self, note: &Note) -> f64 {
        lifecycle::remaining_visibility(note.created_at, self.clock.now())
    }

    /// Publishes a note for `user_id` and starts their cooldown.
    ///
    /// The profile is re-read first so a stale screen cannot bypass the
    /// cooldown. The note and the `lastPostTime` stamp are one atomic batch.
    #[instrument(skip(self, text), fields(user = %user_id))]
    pub async fn publish_note(&self, user_id: &UserId, text: &str) -> Result<Note> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::validation("note text must not be empty"));
        }

        let user = require_user(self.store.as_ref(), user_id).await?;
        let now = self.clock.now();
        if let PostEligibility::CoolingDown { next_allowed_at } =
            lifecycle::can_post(user.last_post_time, now)
        {
            return Err(AppError::validation(format!(
                "you can post again at {}",
                next_allowed_at.format("%Y-%m-%d %H:%M:%S UTC")
            )));
        }
        let Some(nickname) = user.nickname.clone() else {
            return Err(AppError::validation("claim a nickname before posting"));
        };

        let note = Note {
            id: Uuid::now_v7().to_string(),
            owner_id: user_id.clone(),
            text: text.to_string(),
            created_at: now,
            nickname: Some(nickname),
            avatar_url: user.avatar_url.clone(),
        };
        let body = mm_core::to_document(&note).map_err(AppError::unavailable)?;
        let mut stamp = Document::new();
        stamp.insert(
            fields::LAST_POST_TIME.to_string(),
            json!(now.timestamp_millis()),
        );

        self.store
            .commit_batch(vec![
                WriteOp::create(collections::NOTES, &note.id, body),
                WriteOp::set(collections::USERS, user_id.as_str(), stamp, true),
            ])
            .await?;

        info!(note = %note.id, "note published");
        Ok(note)
    }

    /// Visible notes from the viewer and their friends, newest first.
    ///
    /// Every call recomputes from the store. Nickname and avatar come from the
    /// owner's current record, falling back to the copy taken at posting time.
    #[instrument(skip(self, friend_ids), fields(user = %viewer, friends = friend_ids.len()))]
    pub async fn build_feed(&self, viewer: &UserId, friend_ids: &[UserId]) -> Result<Vec<Note>> {
        let now = self.clock.now();
        let cutoff = lifecycle::visibility_cutoff(now).timestamp_millis();

        let mut owners: BTreeSet<&UserId> = friend_ids.iter().collect();
        owners.insert(viewer);
        let owners: Vec<Value> = owners.into_iter().map(Value::from).collect();
        let chunk_size = self
            .store
            .membership_limit()
            .unwrap_or(owners.len())
            .max(1);

        let mut notes = Vec::new();
        for chunk in owners.chunks(chunk_size) {
            let filters = [
                Filter::In(fields::OWNER_ID.to_string(), chunk.to_vec()),
                Filter::Gt(fields::CREATED_AT.to_string(), json!(cutoff)),
            ];
            let rows = self.store.query(collections::NOTES, &filters).await?;
            notes.extend(
                decode_notes(rows)
                    .into_iter()
                    .filter(|n| lifecycle::is_visible(n.created_at, now)),
            );
        }

        self.join_owner_profiles(&mut notes).await?;
        sort_newest_first(&mut notes);
        debug!(notes = notes.len(), "feed built");
        Ok(notes)
    }

    /// The user's own note that is still visible, if any.
    pub async fn active_note(&self, user_id: &UserId) -> Result<Option<Note>> {
        let now = self.clock.now();
        let cutoff = lifecycle::visibility_cutoff(now).timestamp_millis();
        let filters = [
            Filter::Eq(fields::OWNER_ID.to_string(), Value::from(user_id)),
            Filter::Gt(fields::CREATED_AT.to_string(), json!(cutoff)),
        ];
        let rows = self.store.query(collections::NOTES, &filters).await?;
        let mut notes: Vec<Note> = decode_notes(rows)
            .into_iter()
            .filter(|n| lifecycle::is_visible(n.created_at, now))
            .collect();
        sort_newest_first(&mut notes);
        Ok(notes.into_iter().next())
    }

    /// Every note `owner` ever posted, expired ones included, newest first.
    pub async fn notes_by(&self, owner: &UserId) -> Result<Vec<Note>> {
        let filters = [Filter::Eq(fields::OWNER_ID.to_string(), Value::from(owner))];
        let rows = self.store.query(collections::NOTES, &filters).await?;
        let mut notes = decode_notes(rows);
        sort_newest_first(&mut notes);
        Ok(notes)
    }

    async fn join_owner_profiles(&self, notes: &mut [Note]) -> Result<()> {
        let owners: BTreeSet<UserId> = notes.iter().map(|n| n.owner_id.clone()).collect();
        let mut profiles = BTreeMap::new();
        for owner in owners {
            if let Some(profile) = fetch_user(self.store.as_ref(), &owner).await? {
                profiles.insert(owner, profile);
            }
        }
        for note in notes.iter_mut() {
            if let Some(owner) = profiles.get(&note.owner_id) {
                if owner.nickname.is_some() {
                    note.nickname = owner.nickname.clone();
                }
                note.avatar_url = owner.avatar_url.clone();
            }
        }
        Ok(())
    }
}

/// Maps query rows to notes. Rows that do not decode are logged and skipped.
fn decode_notes(rows: Vec<(String, Document)>) -> Vec<Note> {
    rows.into_iter()
        .filter_map(|(id, doc)| match Note::from_document(id.clone(), doc) {
            Ok(note) => Some(note),
            Err(e) => {
                let err = malformed(collections::NOTES, &id, e);
                warn!(error = %err, "skipping unreadable note");
                None
            }
        })
        .collect()
}
