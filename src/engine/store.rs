use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

use super::{EngineError, EntityKind};

pub type SharedLedger = Arc<RwLock<Ledger>>;

/// A row type that can live in a [`Table`].
pub trait Record: Clone {
    const KIND: EntityKind;

    fn id(&self) -> Ulid;
}

impl Record for User {
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> Ulid {
        self.id
    }
}

impl Record for Resource {
    const KIND: EntityKind = EntityKind::Resource;

    fn id(&self) -> Ulid {
        self.id
    }
}

impl Record for Reservation {
    const KIND: EntityKind = EntityKind::Reservation;

    fn id(&self) -> Ulid {
        self.id
    }
}

/// Id-keyed in-memory table. Reads hand out clones; nothing outside sees a live row.
pub struct Table<T> {
    rows: DashMap<Ulid, T>,
}

impl<T: Record> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Table<T> {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    pub fn add(&self, row: T) -> Result<(), EngineError> {
        match self.rows.entry(row.id()) {
            Entry::Occupied(e) => Err(EngineError::DuplicateKey {
                kind: T::KIND,
                id: *e.key(),
            }),
            Entry::Vacant(e) => {
                e.insert(row);
                Ok(())
            }
        }
    }

    pub fn get_by_id(&self, id: &Ulid) -> Option<T> {
        self.rows.get(id).map(|e| e.value().clone())
    }

    pub fn get_all(&self) -> Vec<T> {
        self.rows.iter().map(|e| e.value().clone()).collect()
    }

    pub fn contains(&self, id: &Ulid) -> bool {
        self.rows.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reservations keyed by id, plus a per-caravan ledger index.
///
/// Both containers are written under the caravan's ledger write lock.
pub struct ReservationStore {
    by_id: Table<Reservation>,
    by_resource: DashMap<Ulid, SharedLedger>,
}

impl Default for ReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationStore {
    pub fn new() -> Self {
        Self {
            by_id: Table::new(),
            by_resource: DashMap::new(),
        }
    }

    /// Ledger for a caravan, created empty on first use.
    pub fn ledger(&self, resource_id: Ulid) -> SharedLedger {
        self.by_resource
            .entry(resource_id)
            .or_insert_with(|| Arc::new(RwLock::new(Ledger::new(resource_id))))
            .value()
            .clone()
    }

    /// Ledger for a caravan that already has one. Never creates an entry.
    pub fn existing_ledger(&self, resource_id: &Ulid) -> Option<SharedLedger> {
        self.by_resource.get(resource_id).map(|e| e.value().clone())
    }

    pub async fn add(&self, reservation: Reservation) -> Result<(), EngineError> {
        let ledger = self.ledger(reservation.resource_id);
        let mut guard = ledger.write().await;
        self.add_locked(&mut guard, reservation)
    }

    /// Insert while the caller already holds the caravan's ledger write lock.
    pub(crate) fn add_locked(
        &self,
        ledger: &mut Ledger,
        reservation: Reservation,
    ) -> Result<(), EngineError> {
        debug_assert_eq!(ledger.resource_id, reservation.resource_id);
        self.by_id.add(reservation.clone())?;
        ledger.insert(reservation);
        Ok(())
    }

    pub fn get_by_id(&self, id: &Ulid) -> Option<Reservation> {
        self.by_id.get_by_id(id)
    }

    pub fn get_all(&self) -> Vec<Reservation> {
        self.by_id.get_all()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Every reservation on a caravan, any status. Empty for an unknown caravan.
    pub async fn get_for_resource(&self, resource_id: &Ulid) -> Vec<Reservation> {
        let Some(ledger) = self.existing_ledger(resource_id) else {
            return Vec::new();
        };
        let guard = ledger.read().await;
        guard.reservations.clone()
    }
}
