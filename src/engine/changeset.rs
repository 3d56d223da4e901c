use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::model::{EventMutation, EventStatus};

/// Per-event uncommitted field diffs. Every entry is a delta relative to the
/// baseline captured at session entry; writing a value equal to the baseline
/// removes the field again, so the map never carries no-op entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    entries: HashMap<Ulid, FieldDelta>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDelta {
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub status: Option<EventStatus>,
}

impl FieldDelta {
    fn is_empty(&self) -> bool {
        self.date.is_none() && self.location.is_none() && self.status.is_none()
    }
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, event_id: &Ulid) -> Option<&FieldDelta> {
        self.entries.get(event_id)
    }

    pub fn remove(&mut self, event_id: &Ulid) -> Option<FieldDelta> {
        self.entries.remove(event_id)
    }

    pub fn record_date(&mut self, event_id: Ulid, new: DateTime<Utc>, baseline: DateTime<Utc>) {
        let entry = self.entries.entry(event_id).or_default();
        entry.date = if new == baseline { None } else { Some(new) };
        self.drop_if_empty(&event_id);
    }

    pub fn record_location(&mut self, event_id: Ulid, new: &str, baseline: &str) {
        let entry = self.entries.entry(event_id).or_default();
        entry.location = if new == baseline {
            None
        } else {
            Some(new.to_string())
        };
        self.drop_if_empty(&event_id);
    }

    pub fn record_status(&mut self, event_id: Ulid, new: EventStatus, baseline: EventStatus) {
        let entry = self.entries.entry(event_id).or_default();
        entry.status = if new == baseline { None } else { Some(new) };
        self.drop_if_empty(&event_id);
    }

    fn drop_if_empty(&mut self, event_id: &Ulid) {
        if self.entries.get(event_id).is_some_and(FieldDelta::is_empty) {
            self.entries.remove(event_id);
        }
    }

    /// Flatten to the bulk-write wire shape, id-sorted for determinism.
    pub fn collect(&self) -> Vec<EventMutation> {
        let mut out: Vec<EventMutation> = self
            .entries
            .iter()
            .map(|(id, delta)| EventMutation {
                event_id: *id,
                date: delta.date,
                location: delta.location.clone(),
                status: delta.status,
            })
            .collect();
        out.sort_by_key(|m| m.event_id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn recording_baseline_value_removes_entry() {
        let mut cs = ChangeSet::new();
        let id = Ulid::new();
        cs.record_date(id, t(10), t(9));
        assert_eq!(cs.len(), 1);
        cs.record_date(id, t(9), t(9));
        assert!(cs.is_empty());
    }

    #[test]
    fn independent_fields_survive_normalization() {
        let mut cs = ChangeSet::new();
        let id = Ulid::new();
        cs.record_date(id, t(10), t(9));
        cs.record_location(id, "Lagoon", "North beach");
        cs.record_date(id, t(9), t(9));
        let delta = cs.get(&id).unwrap();
        assert_eq!(delta.date, None);
        assert_eq!(delta.location.as_deref(), Some("Lagoon"));
        assert_eq!(cs.len(), 1);
    }

    #[test]
    fn collect_is_sorted_by_id() {
        let mut cs = ChangeSet::new();
        let mut ids: Vec<Ulid> = (0..5).map(|_| Ulid::new()).collect();
        for id in &ids {
            cs.record_status(*id, EventStatus::Completed, EventStatus::Planned);
        }
        ids.sort();
        let collected = cs.collect();
        let collected_ids: Vec<Ulid> = collected.iter().map(|m| m.event_id).collect();
        assert_eq!(collected_ids, ids);
        assert!(collected.iter().all(|m| m.status == Some(EventStatus::Completed)));
    }

    #[test]
    fn collect_does_not_clear() {
        let mut cs = ChangeSet::new();
        cs.record_location(Ulid::new(), "Lagoon", "");
        let _ = cs.collect();
        assert_eq!(cs.len(), 1);
    }
}
