use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Durations and deltas are whole minutes — the only duration unit.
pub type Minutes = i64;

/// Lifecycle of a scheduled lesson occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Planned,
    Tbc,
    Completed,
    Uncompleted,
}

/// Where a node came from: round-tripped through persistence, or created
/// locally and not yet confirmed by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provenance {
    #[default]
    Confirmed,
    Optimistic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: Ulid,
    pub username: String,
}

/// Denormalized package fields a timeline card needs — captured at build
/// time, never re-derived from ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSnapshot {
    pub category: String,
    pub capacity: u32,
    pub price_cents: i64,
    pub duration_min: Minutes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionKind {
    Fixed,
    PerStudent,
    Percentage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionSnapshot {
    pub kind: CommissionKind,
    pub rate: f64,
}

/// One scheduled lesson occurrence. Identity and linkage are set at
/// construction; scheduling fields (`date`, `location`, `status`) are mutated
/// only through the owning `TeacherQueue` so ordering invariants hold.
#[derive(Debug, Clone, PartialEq)]
pub struct EventNode {
    pub id: Ulid,
    pub lesson_id: Ulid,
    pub booking_id: Ulid,
    pub leader_name: String,
    pub students: Vec<String>,
    pub package: PackageSnapshot,
    pub commission: CommissionSnapshot,
    pub date: DateTime<Utc>,
    /// Must be > 0.
    pub duration_min: Minutes,
    pub location: String,
    pub status: EventStatus,
    pub provenance: Provenance,
}

impl EventNode {
    pub fn end(&self) -> DateTime<Utc> {
        self.date + Duration::minutes(self.duration_min)
    }

    pub fn is_same_event(&self, other: &EventNode) -> bool {
        self.id == other.id
    }
}

// ── Snapshot input (persistence edge, one read per day/school) ───

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Ulid,
    pub date: DateTime<Utc>,
    pub duration_min: Minutes,
    pub location: String,
    pub status: EventStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonRecord {
    pub id: Ulid,
    pub teacher_id: Ulid,
    pub commission: CommissionSnapshot,
    pub events: Vec<EventRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: Ulid,
    pub leader_name: String,
    pub students: Vec<String>,
    pub package: PackageSnapshot,
    pub lessons: Vec<LessonRecord>,
}

/// Flat read of everything scheduled on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySnapshot {
    pub day: NaiveDate,
    pub bookings: Vec<BookingRecord>,
}

// ── Change-set output (persistence edge, bulk write) ─────────────

/// One per-event field diff. Absent fields are untouched by the bulk update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMutation {
    pub event_id: Ulid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
}

// ── Query result types ───────────────────────────────────────────

/// Per-teacher derived view data — consumed by rendering, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineView {
    pub teacher: Teacher,
    pub earliest: Option<DateTime<Utc>>,
    pub events: Vec<EventNode>,
    pub total_minutes: Minutes,
}

/// "X of Y pending teachers already sit at this value."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    pub matched: usize,
    pub total: usize,
}

impl LockStatus {
    pub fn is_synchronized(&self) -> bool {
        self.total > 0 && self.matched == self.total
    }
}
