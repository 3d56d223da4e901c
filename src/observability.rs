// ── RED metrics (operator-driven) ───────────────────────────────

/// Counter: adjustment sessions opened.
pub const SESSIONS_TOTAL: &str = "dayline_adjustment_sessions_total";

/// Counter: adjust/lock calls executed. Labels: op.
pub const ADJUSTMENTS_TOTAL: &str = "dayline_adjustments_total";

/// Histogram: events changed by one adjust/lock call.
pub const ADJUSTED_EVENTS: &str = "dayline_adjusted_events";

/// Counter: discard ("Reset") calls.
pub const DISCARDS_TOTAL: &str = "dayline_discards_total";

/// Counter: submits attempted. Labels: status.
pub const COMMITS_TOTAL: &str = "dayline_commits_total";

/// Histogram: bulk-write round-trip in seconds.
pub const COMMIT_DURATION_SECONDS: &str = "dayline_commit_duration_seconds";

/// Histogram: mutations per submitted batch.
pub const COMMIT_BATCH_SIZE: &str = "dayline_commit_batch_size";

// ── USE metrics (model churn) ────────────────────────────────────

/// Counter: full queue rebuilds from a snapshot.
pub const SNAPSHOT_REBUILDS_TOTAL: &str = "dayline_snapshot_rebuilds_total";

/// Counter: snapshots deferred because a session was active.
pub const SNAPSHOT_DEFERRED_TOTAL: &str = "dayline_snapshot_deferred_total";
