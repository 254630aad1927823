//! Relationship transitions and nickname lookups over every store backend.

mod common;

use common::{Harness, ALL_BACKENDS};
use mm_core::models::RelationshipStatus;
use mm_core::AppError;

#[tokio::test]
async fn request_and_accept() {
    for backend in ALL_BACKENDS {
        let h = Harness::new(backend).await;
        let a = h.sign_up("a", "alice").await;
        let b = h.sign_up("b", "bob").await;
        let rel = &h.services.relationships;

        rel.send_request(&a, &b).await.unwrap();
        assert_eq!(rel.status_between(&a, &b).await.unwrap(), RelationshipStatus::RequestSent);
        assert_eq!(
            rel.status_between(&b, &a).await.unwrap(),
            RelationshipStatus::RequestReceived
        );
        assert_eq!(rel.incoming_requests(&b).await.unwrap()[0].id, a);

        rel.accept_request(&b, &a).await.unwrap();
        assert_eq!(rel.status_between(&a, &b).await.unwrap(), RelationshipStatus::Friends);
        assert_eq!(rel.status_between(&b, &a).await.unwrap(), RelationshipStatus::Friends);

        let pa = h.services.profiles.load_profile(&a).await.unwrap();
        let pb = h.services.profiles.load_profile(&b).await.unwrap();
        assert!(!pa.friend_requests_sent.contains(&b), "{backend:?}");
        assert!(!pa.friend_requests_received.contains(&b), "{backend:?}");
        assert!(!pb.friend_requests_sent.contains(&a), "{backend:?}");
        assert!(!pb.friend_requests_received.contains(&a), "{backend:?}");
        assert_eq!(rel.friends(&a).await.unwrap()[0].nickname.as_deref(), Some("bob"));
    }
}

#[tokio::test]
async fn declining_twice_leaves_no_relationship() {
    for backend in ALL_BACKENDS {
        let h = Harness::new(backend).await;
        let a = h.sign_up("a", "alice").await;
        let b = h.sign_up("b", "bob").await;
        let rel = &h.services.relationships;

        rel.decline_request(&b, &a).await.unwrap();
        rel.send_request(&a, &b).await.unwrap();
        rel.decline_request(&b, &a).await.unwrap();
        rel.decline_request(&b, &a).await.unwrap();
        assert_eq!(rel.status_between(&a, &b).await.unwrap(), RelationshipStatus::None);
        assert_eq!(rel.status_between(&b, &a).await.unwrap(), RelationshipStatus::None);
    }
}

#[tokio::test]
async fn nicknames_are_unique() {
    for backend in ALL_BACKENDS {
        let h = Harness::new(backend).await;
        let a = h.sign_up("a", "alice").await;
        let (b, _) = h
            .services
            .session
            .sign_in(mm_core::SignInProvider::Google, "b")
            .await
            .unwrap();

        let resolved = h.services.relationships.resolve_nickname("alice").await.unwrap();
        assert_eq!(resolved.id, a);

        let err = h.services.profiles.claim_nickname(&b.id, "alice").await.unwrap_err();
        assert!(matches!(err, AppError::Taken(_)), "{backend:?}");
        assert_eq!(err.user_message(), "Nickname Taken");
    }
}

#[tokio::test]
async fn self_request_changes_nothing() {
    for backend in ALL_BACKENDS {
        let h = Harness::new(backend).await;
        let a = h.sign_up("a", "alice").await;
        let before = h.services.profiles.load_profile(&a).await.unwrap();

        let err = h.services.relationships.send_request(&a, &a).await.unwrap_err();
        assert!(matches!(err, AppError::SelfRequest));
        assert_eq!(h.services.profiles.load_profile(&a).await.unwrap(), before);
    }
}
