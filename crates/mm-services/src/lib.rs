//! # mm-services
//!
//! Application logic for memeow, written against the ports in `mm-core`.

pub mod navigation;
pub mod notes;
pub mod profiles;
pub mod relationships;
pub mod session;

pub use navigation::{Screen, Tab};
pub use notes::NoteService;
pub use profiles::ProfileService;
pub use relationships::RelationshipService;
pub use session::SessionService;

use mm_core::{Clock, DocumentStore, IdentityProvider, ObjectStore};
use std::sync::Arc;

/// All services wired to one set of adapters.
#[derive(Clone)]
pub struct Services {
    pub notes: NoteService,
    pub relationships: RelationshipService,
    pub profiles: ProfileService,
    pub session: SessionService,
}

impl Services {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let profiles = ProfileService::new(store.clone(), objects);
        Self {
            notes: NoteService::new(store.clone(), clock),
            relationships: RelationshipService::new(store),
            session: SessionService::new(identity, profiles.clone()),
            profiles,
        }
    }
}
