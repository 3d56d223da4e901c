//! Hard bounds on untrusted input. Exceeding any of these is
//! `EngineError::LimitExceeded`, never a panic.

pub const MAX_TEACHERS_PER_DAY: usize = 512;
pub const MAX_EVENTS_PER_TEACHER: usize = 256;
pub const MAX_LOCATION_LEN: usize = 256;
pub const MAX_USERNAME_LEN: usize = 128;
pub const MAX_CHANGESET_SIZE: usize = 4096;
