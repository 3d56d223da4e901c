use chrono::{DateTime, NaiveTime, Utc};

use crate::model::{EventMutation, LockStatus, Teacher};

use super::GlobalFlag;

impl GlobalFlag {
    /// Teachers eligible for the current session, in display order. Empty
    /// when idle.
    pub fn get_pending_teachers(&self) -> Vec<Teacher> {
        self.display_order
            .iter()
            .filter(|id| self.pending.contains(id))
            .map(|id| self.queues[id].teacher.clone())
            .collect()
    }

    /// Earliest event time across all pending teachers, `None` when nothing
    /// is scheduled.
    pub fn earliest_pending_time(&self) -> Option<DateTime<Utc>> {
        self.pending
            .iter()
            .filter_map(|id| self.queues.get(id))
            .filter_map(|q| q.get_earliest_event_time())
            .min()
    }

    /// How many pending teachers' earliest events already sit at `time`.
    /// Pure query; drives "X/Y synchronized" displays.
    pub fn get_lock_status_time(&self, time: NaiveTime) -> LockStatus {
        let target = self.day.and_time(time).and_utc();
        let matched = self
            .pending
            .iter()
            .filter_map(|id| self.queues.get(id))
            .filter(|q| q.get_earliest_event_time() == Some(target))
            .count();
        LockStatus {
            matched,
            total: self.pending.len(),
        }
    }

    /// How many pending teachers' earliest events already carry `location`.
    pub fn get_lock_status_location(&self, location: &str) -> LockStatus {
        let matched = self
            .pending
            .iter()
            .filter_map(|id| self.queues.get(id))
            .filter(|q| q.earliest_event().is_some_and(|e| e.location == location))
            .count();
        LockStatus {
            matched,
            total: self.pending.len(),
        }
    }

    /// Size of the uncommitted change-set; gates the submit button.
    pub fn get_changed_events_count(&self) -> usize {
        self.changes.len()
    }

    /// Flat copy of the accumulated diffs for the bulk-write collaborator.
    /// Does not clear — clearing happens on discard or successful submit.
    pub fn collect_changes(&self) -> Vec<EventMutation> {
        self.changes.collect()
    }

    pub fn proposed_time(&self) -> Option<NaiveTime> {
        self.proposed_time
    }

    pub fn proposed_location(&self) -> Option<&str> {
        self.proposed_location.as_deref()
    }
}
