//! Database service layer
//!
//! Bundles the typed repositories over one document store.

use std::sync::Arc;

use crate::database::repositories::{
    AttendanceRepository, EventRepository, FeedbackRepository, PastEventRepository,
    RegistrationRepository, UserRepository,
};
use crate::database::store::DocumentStore;

#[derive(Clone)]
pub struct DatabaseService {
    pub events: EventRepository,
    pub registrations: RegistrationRepository,
    pub attendance: AttendanceRepository,
    pub users: UserRepository,
    pub feedback: FeedbackRepository,
    pub past_events: PastEventRepository,
    store: Arc<dyn DocumentStore>,
}

impl DatabaseService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            events: EventRepository::new(store.clone()),
            registrations: RegistrationRepository::new(store.clone()),
            attendance: AttendanceRepository::new(store.clone()),
            users: UserRepository::new(store.clone()),
            feedback: FeedbackRepository::new(store.clone()),
            past_events: PastEventRepository::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend_tag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    #[test]
    fn test_database_service_over_memory_store() {
        let service = DatabaseService::new(Arc::new(MemoryStore::new()));
        assert_eq!(service.backend(), "memory");
    }
}
