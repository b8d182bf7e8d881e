use std::fmt;

use ulid::Ulid;

use crate::model::{AvailabilityState, DateSpan};

/// What kind of record a lookup or insert was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Guest,
    Host,
    Resource,
    Reservation,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::User => "user",
            EntityKind::Guest => "guest",
            EntityKind::Host => "host",
            EntityKind::Resource => "caravan",
            EntityKind::Reservation => "reservation",
        })
    }
}

/// Which date-sanity rule a request broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateViolation {
    EndNotAfterStart,
    StartInPast,
}

impl fmt::Display for DateViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DateViolation::EndNotAfterStart => "end date must be after start date",
            DateViolation::StartInPast => "start date cannot be in the past",
        })
    }
}

#[derive(Debug)]
pub enum EngineError {
    NotFound { kind: EntityKind, id: Ulid },
    DuplicateKey { kind: EntityKind, id: Ulid },
    InvalidDate(DateViolation),
    ResourceUnavailable {
        name: String,
        state: AvailabilityState,
    },
    /// First active reservation found overlapping the request.
    BookingConflict { reservation_id: Ulid, span: DateSpan },
    InvalidReservation(&'static str),
    InvalidResource(&'static str),
    LimitExceeded(&'static str),
}

impl EngineError {
    pub(crate) fn not_found(kind: EntityKind, id: Ulid) -> Self {
        EngineError::NotFound { kind, id }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound { kind, id } => write!(f, "{kind} with id {id} not found"),
            EngineError::DuplicateKey { kind, id } => {
                write!(f, "{kind} with id {id} already exists")
            }
            EngineError::InvalidDate(v) => write!(f, "invalid date: {v}"),
            EngineError::ResourceUnavailable { name, state } => {
                write!(f, "caravan '{name}' is not available for booking ({state})")
            }
            EngineError::BookingConflict { span, .. } => write!(
                f,
                "caravan is already booked between {} and {}",
                span.start, span.end
            ),
            EngineError::InvalidReservation(msg) => write!(f, "invalid reservation: {msg}"),
            EngineError::InvalidResource(msg) => write!(f, "invalid caravan: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
