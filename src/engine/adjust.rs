use chrono::NaiveTime;
use ulid::Ulid;

use crate::limits::*;
use crate::model::EventStatus;
use crate::notify::QueueEvent;
use crate::observability;

use super::queue::ShiftScope;
use super::{EngineError, GlobalFlag, SessionState};

/// Direction of one step-duration nudge of the proposed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Earlier,
    Later,
}

impl GlobalFlag {
    /// Open an adjustment session: capture per-queue baselines and default
    /// the pending set to every teacher with at least one event today.
    /// No-op when a session is already open.
    pub fn enter_adjustment_mode(&mut self) {
        if self.state.is_adjusting() {
            tracing::debug!("enter_adjustment_mode: session already open");
            return;
        }
        self.pending = self
            .display_order
            .iter()
            .filter(|id| !self.queues[id].is_empty())
            .copied()
            .collect();
        self.baselines = self
            .pending
            .iter()
            .map(|id| (*id, self.queues[id].capture_baseline()))
            .collect();
        self.state = SessionState::AdjustingUnlocked;
        metrics::counter!(observability::SESSIONS_TOTAL).increment(1);
        tracing::info!(
            day = %self.day,
            pending = self.pending.len(),
            "adjustment session opened"
        );
    }

    /// Close the session. Uncommitted diffs are discarded first — stale
    /// change-sets never leak into a later session. Applies any snapshot
    /// that was deferred while adjusting. No-op when idle.
    pub fn exit_adjustment_mode(&mut self) -> Result<(), EngineError> {
        if !self.state.is_adjusting() {
            return Ok(());
        }
        if !self.changes.is_empty() {
            tracing::info!(
                uncommitted = self.changes.len(),
                "exiting with uncommitted diffs: discarding"
            );
            self.discard_changes()?;
        }
        tracing::info!(day = %self.day, "adjustment session closed");
        self.finish_session()
    }

    /// Propose a new earliest start time for every pending teacher.
    /// Unlocked: only earliest-or-earlier events move. Locked: whole queues
    /// move, preserving spacing. Deltas come from the session baselines, so
    /// re-applying the same time is idempotent. Returns the number of events
    /// that changed.
    pub fn adjust_time(&mut self, time: NaiveTime) -> Result<usize, EngineError> {
        self.require_adjusting("adjust_time")?;
        self.apply_time(time, self.current_scope(), "adjust_time")
    }

    /// Set the proposed location on every pending teacher's selected events.
    pub fn adjust_location(&mut self, location: &str) -> Result<usize, EngineError> {
        self.require_adjusting("adjust_location")?;
        self.apply_loc(location, self.current_scope(), "adjust_location")
    }

    /// Lock the session and force every pending teacher's earliest event to
    /// `time`, shifting each whole queue by its own delta.
    pub fn lock_to_adjustment_time(&mut self, time: NaiveTime) -> Result<usize, EngineError> {
        self.require_adjusting("lock_to_adjustment_time")?;
        self.state = SessionState::AdjustingLocked;
        self.apply_time(time, ShiftScope::WholeQueue, "lock_time")
    }

    /// Lock the session and force `location` onto every pending teacher's
    /// events.
    pub fn lock_to_location(&mut self, location: &str) -> Result<usize, EngineError> {
        self.require_adjusting("lock_to_location")?;
        self.state = SessionState::AdjustingLocked;
        self.apply_loc(location, ShiftScope::WholeQueue, "lock_location")
    }

    /// Move the current proposal one step earlier or later, clamped to the
    /// allowed window, and apply it.
    pub fn nudge_time(&mut self, direction: StepDirection) -> Result<usize, EngineError> {
        self.require_adjusting("nudge_time")?;
        let base = self
            .proposed_time
            .or_else(|| self.earliest_pending_time().map(|d| d.time()))
            .unwrap_or(self.settings.submit_time);
        let step = chrono::Duration::minutes(self.settings.step_minutes);
        let candidate = match direction {
            StepDirection::Earlier => base - step,
            StepDirection::Later => base + step,
        };
        // NaiveTime arithmetic wraps at midnight; reject the wrap instead of
        // jumping to the other end of the day.
        let wrapped = matches!(direction, StepDirection::Earlier) && candidate > base
            || matches!(direction, StepDirection::Later) && candidate < base;
        if wrapped || !self.settings.window.contains(candidate) {
            return Err(EngineError::OutsideWindow(candidate));
        }
        self.adjust_time(candidate)
    }

    /// Record a status transition (e.g. completed) for one event into the
    /// session's change-set.
    pub fn set_event_status(
        &mut self,
        event_id: &Ulid,
        status: EventStatus,
    ) -> Result<(), EngineError> {
        self.require_adjusting("set_event_status")?;
        for teacher_id in self.pending.iter().copied() {
            let queue = self.queues.get_mut(&teacher_id).ok_or(EngineError::UnknownTeacher(teacher_id))?;
            if queue.find_by_id(event_id).is_none() {
                continue;
            }
            queue.set_status(event_id, status);
            if let Some(captured) = self
                .baselines
                .get(&teacher_id)
                .and_then(|b| b.fields.get(event_id))
            {
                self.changes.record_status(*event_id, status, captured.status);
            }
            self.notify.send(
                teacher_id,
                QueueEvent::StatusChanged {
                    teacher_id,
                    event_id: *event_id,
                    status,
                },
            );
            return Ok(());
        }
        Err(EngineError::NotFound(*event_id))
    }

    /// "Reset": roll every pending queue back to its baseline and clear the
    /// change-set. Stays in the current adjustment mode so the operator can
    /// re-adjust. Safe to call at any time; no-op when idle.
    pub fn discard_changes(&mut self) -> Result<(), EngineError> {
        if !self.state.is_adjusting() {
            return Ok(());
        }
        for teacher_id in self.pending.iter().copied() {
            let baseline = self
                .baselines
                .get(&teacher_id)
                .ok_or(EngineError::UnknownTeacher(teacher_id))?;
            if let Some(queue) = self.queues.get_mut(&teacher_id) {
                queue.restore(baseline);
                self.notify.send(teacher_id, QueueEvent::Restored { teacher_id });
            }
        }
        self.changes.clear();
        self.proposed_time = None;
        self.proposed_location = None;
        metrics::counter!(observability::DISCARDS_TOTAL).increment(1);
        tracing::info!(day = %self.day, "adjustment discarded");
        Ok(())
    }

    fn apply_time(
        &mut self,
        time: NaiveTime,
        scope: ShiftScope,
        op: &'static str,
    ) -> Result<usize, EngineError> {
        if !self.settings.window.contains(time) {
            return Err(EngineError::OutsideWindow(time));
        }
        if self.changes.len() >= MAX_CHANGESET_SIZE {
            return Err(EngineError::LimitExceeded("change-set too large"));
        }
        let target = self.day.and_time(time).and_utc();
        let mut total = 0;
        for teacher_id in self.pending.iter().copied() {
            let Some(queue) = self.queues.get_mut(&teacher_id) else {
                continue;
            };
            let Some(baseline) = self.baselines.get(&teacher_id) else {
                continue;
            };
            let changed =
                queue.apply_start_time(target, scope, baseline, &self.settings, &mut self.changes);
            if changed > 0 {
                self.notify.send(
                    teacher_id,
                    QueueEvent::TimeShifted {
                        teacher_id,
                        changed,
                    },
                );
            }
            total += changed;
        }
        self.proposed_time = Some(time);
        metrics::counter!(observability::ADJUSTMENTS_TOTAL, "op" => op).increment(1);
        metrics::histogram!(observability::ADJUSTED_EVENTS).record(total as f64);
        tracing::debug!(%time, op, changed = total, "time adjustment applied");
        Ok(total)
    }

    fn apply_loc(
        &mut self,
        location: &str,
        scope: ShiftScope,
        op: &'static str,
    ) -> Result<usize, EngineError> {
        if location.len() > MAX_LOCATION_LEN {
            return Err(EngineError::LimitExceeded("location too long"));
        }
        if self.changes.len() >= MAX_CHANGESET_SIZE {
            return Err(EngineError::LimitExceeded("change-set too large"));
        }
        let mut total = 0;
        for teacher_id in self.pending.iter().copied() {
            let Some(queue) = self.queues.get_mut(&teacher_id) else {
                continue;
            };
            let Some(baseline) = self.baselines.get(&teacher_id) else {
                continue;
            };
            let changed = queue.apply_location(location, scope, baseline, &mut self.changes);
            if changed > 0 {
                self.notify.send(
                    teacher_id,
                    QueueEvent::LocationChanged {
                        teacher_id,
                        changed,
                    },
                );
            }
            total += changed;
        }
        self.proposed_location = Some(location.to_string());
        metrics::counter!(observability::ADJUSTMENTS_TOTAL, "op" => op).increment(1);
        metrics::histogram!(observability::ADJUSTED_EVENTS).record(total as f64);
        tracing::debug!(location, op, changed = total, "location adjustment applied");
        Ok(total)
    }
}
