mod adjust;
mod builder;
mod changeset;
mod commit;
mod error;
mod queries;
mod queue;

pub use adjust::StepDirection;
pub use builder::{build_teacher_queues, TeacherSortOrder};
pub use changeset::{ChangeSet, FieldDelta};
pub use commit::{BulkWriteReport, CommitSink};
pub use error::EngineError;
pub use queue::{QueueBaseline, ShiftScope, TeacherQueue};

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use ulid::Ulid;

use crate::config::ControllerSettings;
use crate::limits::MAX_EVENTS_PER_TEACHER;
use crate::model::{DaySnapshot, EventNode, Provenance, Teacher, TimelineView};
use crate::notify::{NotifyHub, QueueEvent};

/// Session state of a cross-teacher adjustment, as an explicit machine
/// rather than a pair of booleans. Operations called in the wrong state are
/// rejected with `EngineError::InvalidState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AdjustingUnlocked,
    AdjustingLocked,
}

impl SessionState {
    pub fn is_adjusting(&self) -> bool {
        matches!(self, SessionState::AdjustingUnlocked | SessionState::AdjustingLocked)
    }

    pub(super) fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AdjustingUnlocked => "adjusting (unlocked)",
            SessionState::AdjustingLocked => "adjusting (locked)",
        }
    }

    fn shift_scope(&self) -> ShiftScope {
        match self {
            SessionState::AdjustingLocked => ShiftScope::WholeQueue,
            _ => ShiftScope::EarliestOnly,
        }
    }
}

/// Coordinator for one day's teacher queues and at most one adjustment
/// session. Owns the queues, the pending set, the uncommitted change-set and
/// the baselines needed to discard. Single-writer: exactly one `GlobalFlag`
/// is live per (day, operator) view.
pub struct GlobalFlag {
    day: NaiveDate,
    roster: Vec<Teacher>,
    settings: ControllerSettings,
    sort_order: TeacherSortOrder,
    queues: HashMap<Ulid, TeacherQueue>,
    /// Teacher ids in display order.
    display_order: Vec<Ulid>,
    state: SessionState,
    proposed_time: Option<NaiveTime>,
    proposed_location: Option<String>,
    /// Teachers eligible for the current session.
    pending: BTreeSet<Ulid>,
    baselines: HashMap<Ulid, QueueBaseline>,
    changes: ChangeSet,
    notify: Arc<NotifyHub>,
    /// Snapshot that arrived mid-session; applied when the session ends so
    /// the operator's in-progress edits are never destroyed.
    deferred: Option<DaySnapshot>,
}

impl GlobalFlag {
    pub fn new(
        roster: Vec<Teacher>,
        snapshot: &DaySnapshot,
        settings: ControllerSettings,
        sort_order: TeacherSortOrder,
        notify: Arc<NotifyHub>,
    ) -> Result<Self, EngineError> {
        let mut flag = Self {
            day: snapshot.day,
            roster,
            settings,
            sort_order,
            queues: HashMap::new(),
            display_order: Vec::new(),
            state: SessionState::Idle,
            proposed_time: None,
            proposed_location: None,
            pending: BTreeSet::new(),
            baselines: HashMap::new(),
            changes: ChangeSet::new(),
            notify,
            deferred: None,
        };
        flag.rebuild_from(snapshot)?;
        Ok(flag)
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn queue(&self, teacher_id: &Ulid) -> Option<&TeacherQueue> {
        self.queues.get(teacher_id)
    }

    /// All timelines in display order.
    pub fn timelines(&self) -> Vec<TimelineView> {
        self.display_order
            .iter()
            .map(|id| self.queues[id].view())
            .collect()
    }

    /// Place one event on a teacher's timeline, keeping sort order. Nodes
    /// added while a session is open carry no baseline and are never shifted
    /// by it. Tag locally created placeholders `Provenance::Optimistic` so
    /// rebuilds keep them until a snapshot confirms or supersedes them.
    pub fn insert_event(&mut self, teacher_id: &Ulid, event: EventNode) -> Result<(), EngineError> {
        let queue = self
            .queues
            .get_mut(teacher_id)
            .ok_or(EngineError::UnknownTeacher(*teacher_id))?;
        if queue.len() >= MAX_EVENTS_PER_TEACHER {
            return Err(EngineError::LimitExceeded("too many events for one teacher"));
        }
        queue.insert(event);
        Ok(())
    }

    /// Unlink one event. Absent ids are a no-op, not an error.
    pub fn remove_event(
        &mut self,
        teacher_id: &Ulid,
        event_id: &Ulid,
    ) -> Result<Option<EventNode>, EngineError> {
        let queue = self
            .queues
            .get_mut(teacher_id)
            .ok_or(EngineError::UnknownTeacher(*teacher_id))?;
        Ok(queue.remove(event_id))
    }

    /// Accept a fresh snapshot from the persistence edge. Idle: rebuild
    /// immediately. Adjusting: defer (keeping only the latest) until the
    /// session ends, so uncommitted edits survive external refreshes.
    pub fn sync_from_snapshot(&mut self, snapshot: DaySnapshot) -> Result<(), EngineError> {
        if self.state.is_adjusting() {
            tracing::info!(day = %snapshot.day, "snapshot deferred: adjustment session active");
            metrics::counter!(crate::observability::SNAPSHOT_DEFERRED_TOTAL).increment(1);
            self.deferred = Some(snapshot);
            return Ok(());
        }
        self.day = snapshot.day;
        self.rebuild_from(&snapshot)
    }

    /// Rebuild queues from a snapshot, reconciling provenance: confirmed data
    /// wins for ids the snapshot carries; optimistic-only nodes (placed
    /// locally, not yet round-tripped) are kept.
    fn rebuild_from(&mut self, snapshot: &DaySnapshot) -> Result<(), EngineError> {
        let fresh = build_teacher_queues(&self.roster, snapshot, &self.settings, &self.sort_order)?;

        let mut queues = HashMap::with_capacity(fresh.len());
        let mut display_order = Vec::with_capacity(fresh.len());
        for mut queue in fresh {
            let teacher_id = queue.teacher.id;
            if let Some(old) = self.queues.get(&teacher_id) {
                for node in old.get_all_events() {
                    if node.provenance == Provenance::Optimistic
                        && queue.find_by_id(&node.id).is_none()
                    {
                        queue.insert(node);
                    }
                }
            }
            self.notify.send(
                teacher_id,
                QueueEvent::Rebuilt {
                    teacher_id,
                    events: queue.len(),
                },
            );
            display_order.push(teacher_id);
            queues.insert(teacher_id, queue);
        }
        self.queues = queues;
        self.display_order = display_order;
        metrics::counter!(crate::observability::SNAPSHOT_REBUILDS_TOTAL).increment(1);
        tracing::debug!(day = %self.day, teachers = self.display_order.len(), "queues rebuilt");
        Ok(())
    }

    pub(super) fn require_adjusting(&self, op: &'static str) -> Result<(), EngineError> {
        if self.state.is_adjusting() {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                op,
                state: self.state.name(),
            })
        }
    }

    pub(super) fn current_scope(&self) -> ShiftScope {
        self.state.shift_scope()
    }

    /// Close the session: drop baselines and proposals, go Idle, and apply
    /// any snapshot that arrived while adjusting.
    pub(super) fn finish_session(&mut self) -> Result<(), EngineError> {
        self.state = SessionState::Idle;
        self.baselines.clear();
        self.pending.clear();
        self.proposed_time = None;
        self.proposed_location = None;
        if let Some(snapshot) = self.deferred.take() {
            self.day = snapshot.day;
            self.rebuild_from(&snapshot)?;
        }
        Ok(())
    }
}
