//! Friend requests and friendship.
//!
//! Both sides of a relationship live on the two user records. Every
//! transition rewrites both records in one batch so they never disagree.

use crate::profiles::{fetch_users, require_user, validate_nickname};
use mm_core::models::{
    collections, fields, NicknameReservation, RelationshipStatus, UserId, UserProfile,
};
use mm_core::{AppError, DocumentStore, FieldUpdate, FieldUpdates, Result, WriteOp};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

fn add(field: &str, id: &UserId) -> (String, FieldUpdate) {
    (field.to_string(), FieldUpdate::AddToSet(Value::from(id)))
}

fn remove(field: &str, id: &UserId) -> (String, FieldUpdate) {
    (field.to_string(), FieldUpdate::RemoveFromSet(Value::from(id)))
}

fn update_user(id: &UserId, updates: FieldUpdates) -> WriteOp {
    WriteOp::update(collections::USERS, id.as_str(), updates)
}

#[derive(Clone)]
pub struct RelationshipService {
    store: Arc<dyn DocumentStore>,
}

impl RelationshipService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Looks up the owner of a nickname. Names that could never be claimed
    /// are simply not found.
    pub async fn resolve_nickname(&self, raw: &str) -> Result<UserProfile> {
        let Ok(name) = validate_nickname(raw) else {
            return Err(AppError::not_found("user", raw.trim()));
        };
        let Some(doc) = self
            .store
            .get_record(collections::NICKNAMES, &name)
            .await?
        else {
            return Err(AppError::not_found("user", name));
        };
        let reservation: NicknameReservation = mm_core::from_document(doc)
            .map_err(|e| crate::profiles::malformed(collections::NICKNAMES, &name, e))?;
        require_user(self.store.as_ref(), &reservation.uid).await
    }

    /// How `viewer` currently relates to `subject`.
    pub async fn status_between(
        &self,
        viewer: &UserId,
        subject: &UserId,
    ) -> Result<RelationshipStatus> {
        if viewer == subject {
            return Ok(RelationshipStatus::None);
        }
        let profile = require_user(self.store.as_ref(), viewer).await?;
        Ok(profile.status_toward(subject))
    }

    /// Sends a friend request from `sender` to `target`.
    ///
    /// Re-sending a pending request is harmless. Already being friends is
    /// reported back unchanged. A request the target already sent us must be
    /// accepted instead.
    #[instrument(skip(self), fields(from = %sender, to = %target))]
    pub async fn send_request(
        &self,
        sender: &UserId,
        target: &UserId,
    ) -> Result<RelationshipStatus> {
        if sender == target {
            return Err(AppError::SelfRequest);
        }
        require_user(self.store.as_ref(), target).await?;
        let me = require_user(self.store.as_ref(), sender).await?;

        match me.status_toward(target) {
            RelationshipStatus::Friends => {
                debug!("already friends");
                return Ok(RelationshipStatus::Friends);
            }
            RelationshipStatus::RequestReceived => {
                return Err(AppError::validation(
                    "they already sent you a request; accept it instead",
                ));
            }
            RelationshipStatus::None | RelationshipStatus::RequestSent => {}
        }

        self.store
            .commit_batch(vec![
                update_user(sender, vec![add(fields::REQUESTS_SENT, target)]),
                update_user(target, vec![add(fields::REQUESTS_RECEIVED, sender)]),
            ])
            .await?;

        info!("friend request sent");
        Ok(RelationshipStatus::RequestSent)
    }

    /// `acceptor` accepts the pending request from `requester`.
    ///
    /// Pending entries are cleared in both directions, so two users who asked
    /// each other at the same time end up as plain friends.
    #[instrument(skip(self), fields(by = %acceptor, from = %requester))]
    pub async fn accept_request(
        &self,
        acceptor: &UserId,
        requester: &UserId,
    ) -> Result<RelationshipStatus> {
        if acceptor == requester {
            return Err(AppError::SelfRequest);
        }
        let me = require_user(self.store.as_ref(), acceptor).await?;
        require_user(self.store.as_ref(), requester).await?;

        if !me.friend_requests_received.contains(requester) && !me.friends.contains(requester) {
            return Err(AppError::validation("there is no request to accept"));
        }

        self.store
            .commit_batch(vec![
                update_user(
                    acceptor,
                    vec![
                        add(fields::FRIENDS, requester),
                        remove(fields::REQUESTS_RECEIVED, requester),
                        remove(fields::REQUESTS_SENT, requester),
                    ],
                ),
                update_user(
                    requester,
                    vec![
                        add(fields::FRIENDS, acceptor),
                        remove(fields::REQUESTS_SENT, acceptor),
                        remove(fields::REQUESTS_RECEIVED, acceptor),
                    ],
                ),
            ])
            .await?;

        info!("friend request accepted");
        Ok(RelationshipStatus::Friends)
    }

    /// Drops the pending request from `requester`. Safe to repeat.
    ///
    /// Returns the status `decliner` is left with.
    #[instrument(skip(self), fields(by = %decliner, from = %requester))]
    pub async fn decline_request(
        &self,
        decliner: &UserId,
        requester: &UserId,
    ) -> Result<RelationshipStatus> {
        if decliner == requester {
            return Err(AppError::SelfRequest);
        }
        require_user(self.store.as_ref(), requester).await?;

        self.store
            .commit_batch(vec![
                update_user(decliner, vec![remove(fields::REQUESTS_RECEIVED, requester)]),
                update_user(requester, vec![remove(fields::REQUESTS_SENT, decliner)]),
            ])
            .await?;

        info!("friend request declined");
        let me = require_user(self.store.as_ref(), decliner).await?;
        Ok(me.status_toward(requester))
    }

    /// Profiles of the user's friends, by nickname.
    pub async fn friends(&self, uid: &UserId) -> Result<Vec<UserProfile>> {
        let me = require_user(self.store.as_ref(), uid).await?;
        let mut friends = fetch_users(self.store.as_ref(), &me.friends).await?;
        friends.sort_by(|a, b| a.nickname.cmp(&b.nickname));
        Ok(friends)
    }

    /// Profiles of users waiting on an answer from `uid`.
    pub async fn incoming_requests(&self, uid: &UserId) -> Result<Vec<UserProfile>> {
        let me = require_user(self.store.as_ref(), uid).await?;
        let mut pending = fetch_users(self.store.as_ref(), &me.friend_requests_received).await?;
        pending.sort_by(|a, b| a.nickname.cmp(&b.nickname));
        Ok(pending)
    }
}
