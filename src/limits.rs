//! Store size caps are soft: the count check and the insert are separate steps,
//! so concurrent inserts can overshoot a cap by at most the number of racing writers.
//! Per-caravan reservation caps are exact (checked under the ledger write lock).

/// Max registered users.
pub const MAX_USERS: usize = 100_000;

/// Max caravans.
pub const MAX_RESOURCES: usize = 10_000;

/// Max reservations (any status) stored against a single caravan.
pub const MAX_RESERVATIONS_PER_RESOURCE: usize = 10_000;

/// Max byte length of a user or caravan name.
pub const MAX_NAME_LEN: usize = 256;

/// Max byte length of a contact string or caravan location.
pub const MAX_TEXT_LEN: usize = 1024;

/// Max amenities or photos attached to one caravan.
pub const MAX_LIST_ITEMS: usize = 64;
