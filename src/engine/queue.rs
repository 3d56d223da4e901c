use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use ulid::Ulid;

use crate::config::ControllerSettings;
use crate::model::{EventNode, EventStatus, Minutes, Teacher, TimelineView};

use super::changeset::ChangeSet;

/// Which events move when a new start time is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftScope {
    /// Unlocked: only events at or before the baseline earliest slot move;
    /// later events hold their slot.
    EarliestOnly,
    /// Locked: every baselined event moves by the same delta, preserving
    /// relative spacing.
    WholeQueue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaselineFields {
    pub date: DateTime<Utc>,
    pub location: String,
    pub status: EventStatus,
}

/// Scheduling fields captured at session entry. Deltas are always computed
/// against this, never against the queue's current (already shifted) state,
/// so re-applying the same proposal cannot drift.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueBaseline {
    pub fields: HashMap<Ulid, BaselineFields>,
    pub earliest: Option<DateTime<Utc>>,
}

/// One teacher's date-ordered events for one day. Nodes live in an arena
/// keyed by id; ordering is an explicit index of ids sorted ascending by
/// `date`, ties keeping arrival order.
pub struct TeacherQueue {
    pub teacher: Teacher,
    nodes: HashMap<Ulid, EventNode>,
    order: Vec<Ulid>,
}

impl TeacherQueue {
    pub fn new(teacher: Teacher) -> Self {
        Self {
            teacher,
            nodes: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Replace the queue's contents from an unordered batch. Stable-sorts by
    /// date ascending, ties broken by input order. Prior contents are fully
    /// replaced, no partial merge.
    pub fn sync_events(&mut self, mut events: Vec<EventNode>) {
        events.sort_by_key(|e| e.date);
        self.nodes.clear();
        self.order.clear();
        for event in events {
            self.order.push(event.id);
            self.nodes.insert(event.id, event);
        }
    }

    /// Ordered insert; an event dated equal to existing ones goes after them.
    pub fn insert(&mut self, event: EventNode) {
        let nodes = &self.nodes;
        let pos = self
            .order
            .partition_point(|id| nodes[id].date <= event.date);
        self.order.insert(pos, event.id);
        self.nodes.insert(event.id, event);
    }

    /// Unlink by id. Absent ids are a no-op, not an error.
    pub fn remove(&mut self, event_id: &Ulid) -> Option<EventNode> {
        let removed = self.nodes.remove(event_id)?;
        self.order.retain(|id| id != event_id);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ordered snapshot of the queue. Clones — callers must go through queue
    /// mutators, never patch nodes in place.
    pub fn get_all_events(&self) -> Vec<EventNode> {
        self.order.iter().map(|id| self.nodes[id].clone()).collect()
    }

    pub fn get_earliest_event_time(&self) -> Option<DateTime<Utc>> {
        self.order.first().map(|id| self.nodes[id].date)
    }

    pub fn earliest_event(&self) -> Option<&EventNode> {
        self.order.first().map(|id| &self.nodes[id])
    }

    pub fn find_by_id(&self, event_id: &Ulid) -> Option<&EventNode> {
        self.nodes.get(event_id)
    }

    pub fn total_scheduled_minutes(&self) -> Minutes {
        self.nodes.values().map(|e| e.duration_min).sum()
    }

    pub fn view(&self) -> TimelineView {
        TimelineView {
            teacher: self.teacher.clone(),
            earliest: self.get_earliest_event_time(),
            events: self.get_all_events(),
            total_minutes: self.total_scheduled_minutes(),
        }
    }

    pub fn capture_baseline(&self) -> QueueBaseline {
        QueueBaseline {
            fields: self
                .nodes
                .iter()
                .map(|(id, e)| {
                    (
                        *id,
                        BaselineFields {
                            date: e.date,
                            location: e.location.clone(),
                            status: e.status,
                        },
                    )
                })
                .collect(),
            earliest: self.get_earliest_event_time(),
        }
    }

    /// Roll every baselined node back to its captured fields. Nodes inserted
    /// after capture (optimistic placeholders) are left untouched.
    pub fn restore(&mut self, baseline: &QueueBaseline) {
        for (id, captured) in &baseline.fields {
            if let Some(node) = self.nodes.get_mut(id) {
                node.date = captured.date;
                node.location = captured.location.clone();
                node.status = captured.status;
            }
        }
        self.resort();
    }

    pub fn set_status(&mut self, event_id: &Ulid, status: EventStatus) -> bool {
        match self.nodes.get_mut(event_id) {
            Some(node) if node.status != status => {
                node.status = status;
                true
            }
            _ => false,
        }
    }

    /// Move the queue's earliest slot to `target` and reflow per `scope`.
    ///
    /// The delta is `target − baseline.earliest`; each eligible node's
    /// candidate is its baseline date plus that delta. A candidate is
    /// rejected per-node (the node keeps its previous value) when it would
    /// leave the day, fall outside the start-time window, or — in unlocked
    /// mode — run duration + gap into the first held slot. Returns how many
    /// nodes actually changed. Empty queue is a no-op.
    pub fn apply_start_time(
        &mut self,
        target: DateTime<Utc>,
        scope: ShiftScope,
        baseline: &QueueBaseline,
        settings: &ControllerSettings,
        changes: &mut ChangeSet,
    ) -> usize {
        let Some(earliest) = baseline.earliest else {
            return 0;
        };
        let delta = target - earliest;

        // First slot that does NOT move — the shifted block must not run into it.
        let held_start: Option<DateTime<Utc>> = match scope {
            ShiftScope::WholeQueue => None,
            ShiftScope::EarliestOnly => self
                .order
                .iter()
                .filter(|id| {
                    baseline
                        .fields
                        .get(id)
                        .is_none_or(|b| b.date > earliest)
                })
                .map(|id| self.nodes[id].date)
                .min(),
        };

        let ids: Vec<Ulid> = self.order.clone();
        let mut changed = 0;
        for id in ids {
            let Some(captured) = baseline.fields.get(&id) else {
                // Inserted after capture — no original slot to shift from.
                continue;
            };
            let eligible = match scope {
                ShiftScope::EarliestOnly => captured.date <= earliest,
                ShiftScope::WholeQueue => true,
            };
            if !eligible {
                continue;
            }

            let candidate = captured.date + delta;
            if candidate.date_naive() != captured.date.date_naive()
                || !settings.window.contains(candidate.time())
            {
                tracing::debug!(
                    event = %id,
                    candidate = %candidate,
                    "shift rejected: start outside allowed window"
                );
                continue;
            }
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            if let Some(held) = held_start
                && candidate + Duration::minutes(node.duration_min + settings.gap_minutes) > held
            {
                tracing::debug!(
                    event = %id,
                    candidate = %candidate,
                    held = %held,
                    "shift rejected: would run into a held slot"
                );
                continue;
            }

            if node.date != candidate {
                node.date = candidate;
                changed += 1;
            }
            changes.record_date(id, candidate, captured.date);
        }

        if changed > 0 {
            self.resort();
        }
        changed
    }

    /// Set `location` on the events `scope` selects, recording diffs against
    /// the baseline. Returns how many nodes actually changed.
    pub fn apply_location(
        &mut self,
        target: &str,
        scope: ShiftScope,
        baseline: &QueueBaseline,
        changes: &mut ChangeSet,
    ) -> usize {
        let Some(earliest) = baseline.earliest else {
            return 0;
        };
        let mut changed = 0;
        for id in self.order.clone() {
            let Some(captured) = baseline.fields.get(&id) else {
                continue;
            };
            let eligible = match scope {
                ShiftScope::EarliestOnly => captured.date <= earliest,
                ShiftScope::WholeQueue => true,
            };
            if !eligible {
                continue;
            }
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            if node.location != target {
                node.location = target.to_string();
                changed += 1;
            }
            changes.record_location(id, target, &captured.location);
        }
        changed
    }

    fn resort(&mut self) {
        let nodes = &self.nodes;
        self.order.sort_by_key(|id| nodes[id].date);
    }
}
