use chrono::{Local, NaiveDate};

use crate::model::*;

use super::EngineError;
use super::error::DateViolation;

/// Local calendar date; "the past" is anything before it.
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn check_dates(
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Result<DateSpan, EngineError> {
    if start >= end {
        return Err(EngineError::InvalidDate(DateViolation::EndNotAfterStart));
    }
    if start < today {
        return Err(EngineError::InvalidDate(DateViolation::StartInPast));
    }
    Ok(DateSpan::new(start, end))
}

pub(crate) fn check_resource_state(resource: &Resource) -> Result<(), EngineError> {
    if resource.status != AvailabilityState::Available {
        return Err(EngineError::ResourceUnavailable {
            name: resource.name.clone(),
            state: resource.status,
        });
    }
    Ok(())
}

/// Reports the first active reservation overlapping `span`, in ledger order.
pub(crate) fn check_no_conflict(ledger: &Ledger, span: &DateSpan) -> Result<(), EngineError> {
    for existing in ledger.overlapping(span) {
        if !existing.status.occupies() {
            continue;
        }
        return Err(EngineError::BookingConflict {
            reservation_id: existing.id,
            span: existing.span(),
        });
    }
    Ok(())
}

/// Decide whether `[start, end)` may be booked on `resource` given its ledger.
///
/// Checks run in a fixed order and stop at the first failure:
/// dates, then the caravan's availability state, then overlap with active reservations.
pub fn validate(
    resource: &Resource,
    start: NaiveDate,
    end: NaiveDate,
    ledger: &Ledger,
    today: NaiveDate,
) -> Result<DateSpan, EngineError> {
    let span = check_dates(start, end, today)?;
    check_resource_state(resource)?;
    check_no_conflict(ledger, &span)?;
    Ok(span)
}
