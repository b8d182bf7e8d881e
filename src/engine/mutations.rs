use chrono::NaiveDate;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::admission::{today, validate};
use super::{Engine, EngineError, EntityKind};

impl Engine {
    pub fn register_user(&self, user: User) -> Result<(), EngineError> {
        if self.users.len() >= MAX_USERS {
            return Err(EngineError::LimitExceeded("too many users"));
        }
        if user.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("user name too long"));
        }
        if user.contact.len() > MAX_TEXT_LEN {
            return Err(EngineError::LimitExceeded("contact too long"));
        }
        let (id, role) = (user.id, user.role);
        self.users.add(user)?;
        debug!("registered {role} {id}");
        Ok(())
    }

    /// Host-side listing of a new caravan.
    pub fn create_resource(&self, resource: Resource) -> Result<(), EngineError> {
        if self.resources.len() >= MAX_RESOURCES {
            return Err(EngineError::LimitExceeded("too many caravans"));
        }
        if resource.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("caravan name too long"));
        }
        if resource.location.len() > MAX_TEXT_LEN {
            return Err(EngineError::LimitExceeded("caravan location too long"));
        }
        if resource.amenities.len() > MAX_LIST_ITEMS || resource.photos.len() > MAX_LIST_ITEMS {
            return Err(EngineError::LimitExceeded("too many amenities or photos"));
        }
        if !resource.daily_rate.is_finite() || resource.daily_rate <= 0.0 {
            return Err(EngineError::InvalidResource("daily rate must be a positive amount"));
        }
        if resource.capacity == 0 {
            return Err(EngineError::InvalidResource("capacity must be at least 1"));
        }
        match self.users.get_by_id(&resource.host_id) {
            Some(host) if host.role == UserRole::Host => {}
            _ => return Err(EngineError::not_found(EntityKind::Host, resource.host_id)),
        }

        let (id, name) = (resource.id, resource.name.clone());
        self.resources.add(resource)?;
        info!("caravan {id} listed: {name}");
        Ok(())
    }

    /// Book `[start, end)` on a caravan for a guest.
    ///
    /// Not idempotent: every successful call stores a new reservation under a fresh id.
    pub async fn create_reservation(
        &self,
        guest_id: Ulid,
        resource_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Reservation, EngineError> {
        let result = self.admit(guest_id, resource_id, start, end).await;
        let outcome = observability::reservation_outcome(&result);
        metrics::counter!(observability::RESERVATIONS_TOTAL, "outcome" => outcome).increment(1);
        match &result {
            Ok(r) => info!(
                "reservation {} created: caravan {} [{}, {}) total {:.2}",
                r.id, r.resource_id, r.start_date, r.end_date, r.total_price
            ),
            Err(e) => debug!("reservation rejected for caravan {resource_id}: {e}"),
        }
        result
    }

    async fn admit(
        &self,
        guest_id: Ulid,
        resource_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Reservation, EngineError> {
        if !self.users.contains(&guest_id) {
            return Err(EngineError::not_found(EntityKind::Guest, guest_id));
        }
        let resource = self.resolve_resource(resource_id)?;

        // Held from the conflict check through the insert.
        let ledger = self.reservations.ledger(resource_id);
        let mut guard = ledger.write().await;

        let span = validate(&resource, start, end, &guard, today())?;

        let duration_days = (end - start).num_days();
        if duration_days <= 0 {
            return Err(EngineError::InvalidReservation(
                "reservation must be for at least one day",
            ));
        }
        if guard.len() >= MAX_RESERVATIONS_PER_RESOURCE {
            return Err(EngineError::LimitExceeded("too many reservations on caravan"));
        }

        let reservation = Reservation {
            id: Ulid::new(),
            guest_id,
            resource_id,
            start_date: span.start,
            end_date: span.end,
            total_price: duration_days as f64 * resource.daily_rate,
            status: ReservationStatus::Pending,
        };
        self.reservations.add_locked(&mut guard, reservation.clone())?;
        Ok(reservation)
    }
}
