use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open date range `[start, end)`. `end` is the check-out day and is not occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start < end, "DateSpan start must be before end");
        Self { start, end }
    }

    /// Whole days (nights) covered.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &DateSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }
}

impl fmt::Display for DateSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Guest,
    Host,
}

/// Whether a caravan accepts bookings at all. Per-date occupancy lives in the ledger, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityState {
    #[default]
    Available,
    Reserved,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    /// Whether a reservation in this status still claims its dates.
    pub fn occupies(self) -> bool {
        !matches!(self, ReservationStatus::Cancelled | ReservationStatus::Rejected)
    }
}

macro_rules! impl_lowercase_text {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {other}", stringify!($ty))),
                }
            }
        }
    };
}

impl_lowercase_text!(UserRole { Guest => "guest", Host => "host" });
impl_lowercase_text!(AvailabilityState {
    Available => "available",
    Reserved => "reserved",
    Maintenance => "maintenance",
});
impl_lowercase_text!(ReservationStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Completed => "completed",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default = "Ulid::new")]
    pub id: Ulid,
    pub name: String,
    pub contact: String,
    pub role: UserRole,
    #[serde(default)]
    pub identity_verified: bool,
}

impl User {
    pub fn new(name: impl Into<String>, contact: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: Ulid::new(),
            name: name.into(),
            contact: contact.into(),
            role,
            identity_verified: false,
        }
    }
}

/// A bookable caravan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default = "Ulid::new")]
    pub id: Ulid,
    pub host_id: Ulid,
    pub name: String,
    pub location: String,
    /// Max guests.
    pub capacity: u32,
    pub daily_rate: f64,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub status: AvailabilityState,
}

impl Resource {
    pub fn new(
        host_id: Ulid,
        name: impl Into<String>,
        location: impl Into<String>,
        capacity: u32,
        daily_rate: f64,
    ) -> Self {
        Self {
            id: Ulid::new(),
            host_id,
            name: name.into(),
            location: location.into(),
            capacity,
            daily_rate,
            amenities: Vec::new(),
            photos: Vec::new(),
            status: AvailabilityState::Available,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub guest_id: Ulid,
    pub resource_id: Ulid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price: f64,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn span(&self) -> DateSpan {
        DateSpan::new(self.start_date, self.end_date)
    }
}

/// All reservations on one caravan, sorted by `start_date`. This is the per-resource index.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub resource_id: Ulid,
    pub reservations: Vec<Reservation>,
}

impl Ledger {
    pub fn new(resource_id: Ulid) -> Self {
        Self {
            resource_id,
            reservations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    /// Insert maintaining sort order by start_date; ties keep insertion order.
    pub fn insert(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .partition_point(|r| r.start_date <= reservation.start_date);
        self.reservations.insert(pos, reservation);
    }

    /// Reservations (any status) whose range overlaps the query.
    /// Binary search skips everything starting on or after `query.end`.
    pub fn overlapping(&self, query: &DateSpan) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.start_date < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.end_date > query.start)
    }
}

/// Price preview for a range that currently passes admission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub resource_id: Ulid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
    pub total_price: f64,
}
