mod admission;
mod error;
mod mutations;
mod queries;
mod store;

pub use admission::validate;
pub use error::{DateViolation, EngineError, EntityKind};
pub use store::{Record, ReservationStore, SharedLedger, Table};

use ulid::Ulid;

use crate::model::*;

/// The booking core: users, caravans, and reservations, all memory-resident.
///
/// Reservation creation serializes per caravan on that caravan's ledger lock;
/// bookings on different caravans never wait on each other.
pub struct Engine {
    pub(super) users: Table<User>,
    pub(super) resources: Table<Resource>,
    pub(super) reservations: ReservationStore,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            users: Table::new(),
            resources: Table::new(),
            reservations: ReservationStore::new(),
        }
    }

    pub(super) fn resolve_resource(&self, id: Ulid) -> Result<Resource, EngineError> {
        self.resources
            .get_by_id(&id)
            .ok_or(EngineError::not_found(EntityKind::Resource, id))
    }
}
