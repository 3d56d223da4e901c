use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use ulid::Ulid;

use crate::model::EventMutation;
use crate::notify::QueueEvent;
use crate::observability;

use super::queue::BaselineFields;
use super::{EngineError, GlobalFlag};

/// Per-id outcome of one bulk write. A storage layer that applies the whole
/// batch atomically reports every id as applied; otherwise it must say which
/// ids it rejected so the engine can keep their diffs for a retry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteReport {
    pub applied: Vec<Ulid>,
    pub rejected: Vec<Ulid>,
}

impl BulkWriteReport {
    pub fn all_applied(mutations: &[EventMutation]) -> Self {
        Self {
            applied: mutations.iter().map(|m| m.event_id).collect(),
            rejected: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// The persistence collaborator that applies a collected change-set.
#[async_trait]
pub trait CommitSink: Send + Sync {
    async fn apply(&self, mutations: &[EventMutation]) -> Result<BulkWriteReport, EngineError>;
}

impl GlobalFlag {
    /// Submit the accumulated change-set to the bulk-write collaborator.
    ///
    /// The sink receives a copy; on a transport error the change-set is left
    /// untouched so the operator can retry without redoing the adjustment.
    /// Applied ids are removed from the change-set and rebased into the
    /// baselines — a later discard no longer rolls back committed values.
    /// Queues keep their adjusted values optimistically until the next
    /// snapshot. When every diff is applied, the session closes.
    pub async fn submit(&mut self, sink: &dyn CommitSink) -> Result<BulkWriteReport, EngineError> {
        self.require_adjusting("submit")?;
        let mutations = self.changes.collect();
        if mutations.is_empty() {
            return Ok(BulkWriteReport::default());
        }

        metrics::histogram!(observability::COMMIT_BATCH_SIZE).record(mutations.len() as f64);
        let started = Instant::now();
        let report = match sink.apply(&mutations).await {
            Ok(report) => report,
            Err(e) => {
                metrics::counter!(observability::COMMITS_TOTAL, "status" => "error").increment(1);
                tracing::warn!(error = %e, "bulk write failed; change-set kept for retry");
                return Err(e);
            }
        };
        metrics::histogram!(observability::COMMIT_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        let mut applied_by_teacher: HashMap<Ulid, usize> = HashMap::new();
        for event_id in &report.applied {
            self.changes.remove(event_id);
            for teacher_id in self.pending.iter().copied() {
                let Some(baseline) = self.baselines.get_mut(&teacher_id) else {
                    continue;
                };
                if !baseline.fields.contains_key(event_id) {
                    continue;
                }
                if let Some(node) = self
                    .queues
                    .get(&teacher_id)
                    .and_then(|q| q.find_by_id(event_id))
                {
                    baseline.fields.insert(
                        *event_id,
                        BaselineFields {
                            date: node.date,
                            location: node.location.clone(),
                            status: node.status,
                        },
                    );
                }
                *applied_by_teacher.entry(teacher_id).or_default() += 1;
                break;
            }
        }
        for (teacher_id, applied) in applied_by_teacher {
            self.notify.send(teacher_id, QueueEvent::Committed { teacher_id, applied });
        }

        let status = if report.is_complete() { "ok" } else { "partial" };
        metrics::counter!(observability::COMMITS_TOTAL, "status" => status).increment(1);
        if !report.rejected.is_empty() {
            tracing::warn!(
                rejected = report.rejected.len(),
                "bulk write rejected some ids; their diffs are kept"
            );
        }
        tracing::info!(
            applied = report.applied.len(),
            rejected = report.rejected.len(),
            "bulk write finished"
        );

        if self.changes.is_empty() {
            self.finish_session()?;
        }
        Ok(report)
    }
}
