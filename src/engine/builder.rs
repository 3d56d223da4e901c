use std::collections::HashMap;

use ulid::Ulid;

use crate::config::ControllerSettings;
use crate::limits::*;
use crate::model::{DaySnapshot, EventNode, Provenance, Teacher};

use super::queue::TeacherQueue;
use super::EngineError;

/// Explicit cross-teacher display ordering (drag-reorder priority), owned by
/// the caller and injected — never a module-level singleton. Teachers without
/// a configured position fall back to roster order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeacherSortOrder {
    positions: HashMap<Ulid, usize>,
}

impl TeacherSortOrder {
    pub fn new(ordered_ids: impl IntoIterator<Item = Ulid>) -> Self {
        Self {
            positions: ordered_ids
                .into_iter()
                .enumerate()
                .map(|(pos, id)| (id, pos))
                .collect(),
        }
    }

    pub fn position(&self, teacher_id: &Ulid) -> Option<usize> {
        self.positions.get(teacher_id).copied()
    }

    pub fn set_position(&mut self, teacher_id: Ulid, position: usize) {
        self.positions.insert(teacher_id, position);
    }
}

/// Flatten one day's snapshot into one queue per roster teacher.
///
/// Every roster teacher gets a queue, including teachers with zero events.
/// Events are denormalized with their booking/package/commission snapshots at
/// build time and filtered to the snapshot day. `gap_minutes` is not applied
/// here: events land exactly at their snapshot dates, and the gap is
/// consulted only by the adjustment clamp.
pub fn build_teacher_queues(
    roster: &[Teacher],
    snapshot: &DaySnapshot,
    settings: &ControllerSettings,
    sort_order: &TeacherSortOrder,
) -> Result<Vec<TeacherQueue>, EngineError> {
    if roster.len() > MAX_TEACHERS_PER_DAY {
        return Err(EngineError::LimitExceeded("too many teachers on roster"));
    }
    for teacher in roster {
        if teacher.username.len() > MAX_USERNAME_LEN {
            return Err(EngineError::LimitExceeded("teacher username too long"));
        }
    }

    let mut events_by_teacher: HashMap<Ulid, Vec<EventNode>> = HashMap::new();
    for booking in &snapshot.bookings {
        for lesson in &booking.lessons {
            for event in &lesson.events {
                if event.date.date_naive() != snapshot.day {
                    continue;
                }
                if event.location.len() > MAX_LOCATION_LEN {
                    return Err(EngineError::LimitExceeded("event location too long"));
                }
                let cap = settings.duration_cap(booking.students.len());
                if event.duration_min > cap {
                    tracing::warn!(
                        event = %event.id,
                        teacher = %lesson.teacher_id,
                        duration = event.duration_min,
                        cap,
                        "event exceeds duration cap for its student count"
                    );
                }
                events_by_teacher
                    .entry(lesson.teacher_id)
                    .or_default()
                    .push(EventNode {
                        id: event.id,
                        lesson_id: lesson.id,
                        booking_id: booking.id,
                        leader_name: booking.leader_name.clone(),
                        students: booking.students.clone(),
                        package: booking.package.clone(),
                        commission: lesson.commission.clone(),
                        date: event.date,
                        duration_min: event.duration_min,
                        location: event.location.clone(),
                        status: event.status,
                        provenance: Provenance::Confirmed,
                    });
            }
        }
    }

    // Stable sort: configured positions first, everyone else in roster order.
    let mut ordered: Vec<&Teacher> = roster.iter().collect();
    ordered.sort_by_key(|t| sort_order.position(&t.id).unwrap_or(usize::MAX));

    let mut queues = Vec::with_capacity(ordered.len());
    for teacher in ordered {
        let events = events_by_teacher.remove(&teacher.id).unwrap_or_default();
        if events.len() > MAX_EVENTS_PER_TEACHER {
            return Err(EngineError::LimitExceeded("too many events for one teacher"));
        }
        let mut queue = TeacherQueue::new(teacher.clone());
        queue.sync_events(events);
        queues.push(queue);
    }
    Ok(queues)
}
