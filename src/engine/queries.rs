use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::admission::{self, today};
use super::{Engine, EngineError};

impl Engine {
    pub fn get_user(&self, id: &Ulid) -> Option<User> {
        self.users.get_by_id(id)
    }

    pub fn get_resource(&self, id: &Ulid) -> Option<Resource> {
        self.resources.get_by_id(id)
    }

    pub fn get_reservation(&self, id: &Ulid) -> Option<Reservation> {
        self.reservations.get_by_id(id)
    }

    pub fn list_users(&self) -> Vec<User> {
        self.users.get_all()
    }

    pub fn list_resources(&self) -> Vec<Resource> {
        self.resources.get_all()
    }

    pub fn list_reservations(&self) -> Vec<Reservation> {
        self.reservations.get_all()
    }

    /// All reservations on a caravan, any status, sorted by start date.
    pub async fn reservations_for_resource(&self, resource_id: &Ulid) -> Vec<Reservation> {
        self.reservations.get_for_resource(resource_id).await
    }

    /// Placeholder "current guest": the guest with the lowest id, if any.
    pub fn first_guest(&self) -> Option<User> {
        self.users
            .get_all()
            .into_iter()
            .filter(|u| u.role == UserRole::Guest)
            .min_by_key(|u| u.id)
    }

    /// Run admission for `[start, end)` against the current ledger without booking.
    pub async fn validate(
        &self,
        resource: &Resource,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DateSpan, EngineError> {
        let Some(ledger) = self.reservations.existing_ledger(&resource.id) else {
            let empty = Ledger::new(resource.id);
            return admission::validate(resource, start, end, &empty, today());
        };
        let guard = ledger.read().await;
        admission::validate(resource, start, end, &guard, today())
    }

    /// Price a stay the way `create_reservation` would, if it were booked right now.
    pub async fn quote(
        &self,
        resource_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Quote, EngineError> {
        let resource = self.resolve_resource(resource_id)?;
        let span = self.validate(&resource, start, end).await?;
        let days = span.days();
        Ok(Quote {
            resource_id,
            start_date: span.start,
            end_date: span.end,
            days,
            total_price: days as f64 * resource.daily_rate,
        })
    }
}
