//! End-to-end adjustment flow against an in-memory persistence fake: build
//! queues from a snapshot, run a locked adjustment session, commit through a
//! `CommitSink` that writes back into the snapshot, then reconcile a fresh
//! read — including an optimistic placeholder that persistence confirms late.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use ulid::Ulid;

use dayline::config::ControllerSettings;
use dayline::engine::{
    build_teacher_queues, BulkWriteReport, CommitSink, EngineError, GlobalFlag, SessionState,
    TeacherSortOrder,
};
use dayline::model::{
    BookingRecord, CommissionKind, CommissionSnapshot, DaySnapshot, EventMutation, EventNode,
    EventRecord, EventStatus, LessonRecord, PackageSnapshot, Provenance, Teacher,
};
use dayline::notify::{NotifyHub, QueueEvent};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, h, m, 0).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn teacher(name: &str) -> Teacher {
    Teacher {
        id: Ulid::new(),
        username: name.into(),
    }
}

fn booking(teacher_id: Ulid, events: Vec<EventRecord>) -> BookingRecord {
    BookingRecord {
        id: Ulid::new(),
        leader_name: "Mara".into(),
        students: vec!["Mara".into(), "Iris".into()],
        package: PackageSnapshot {
            category: "windsurf".into(),
            capacity: 2,
            price_cents: 18_000,
            duration_min: 60,
        },
        lessons: vec![LessonRecord {
            id: Ulid::new(),
            teacher_id,
            commission: CommissionSnapshot {
                kind: CommissionKind::PerStudent,
                rate: 12.5,
            },
            events,
        }],
    }
}

fn record(h: u32, m: u32) -> EventRecord {
    EventRecord {
        id: Ulid::new(),
        date: at(h, m),
        duration_min: 60,
        location: "North beach".into(),
        status: EventStatus::Planned,
    }
}

/// Persistence fake: holds the canonical day snapshot and applies bulk
/// mutations to it, the way the real storage layer would.
struct SnapshotStore {
    snapshot: Mutex<DaySnapshot>,
}

impl SnapshotStore {
    fn new(snapshot: DaySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    fn read(&self) -> DaySnapshot {
        self.snapshot.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommitSink for SnapshotStore {
    async fn apply(&self, mutations: &[EventMutation]) -> Result<BulkWriteReport, EngineError> {
        let mut snapshot = self.snapshot.lock().unwrap();
        let mut report = BulkWriteReport::default();
        for m in mutations {
            let mut found = false;
            for b in &mut snapshot.bookings {
                for l in &mut b.lessons {
                    for e in &mut l.events {
                        if e.id != m.event_id {
                            continue;
                        }
                        if let Some(d) = m.date {
                            e.date = d;
                        }
                        if let Some(loc) = &m.location {
                            e.location = loc.clone();
                        }
                        if let Some(s) = m.status {
                            e.status = s;
                        }
                        found = true;
                    }
                }
            }
            if found {
                report.applied.push(m.event_id);
            } else {
                report.rejected.push(m.event_id);
            }
        }
        Ok(report)
    }
}

#[tokio::test]
async fn locked_session_commits_and_fresh_snapshot_agrees() {
    let ana = teacher("ana");
    let ben = teacher("ben");
    let store = SnapshotStore::new(DaySnapshot {
        day: day(),
        bookings: vec![
            booking(ana.id, vec![record(9, 0), record(11, 0)]),
            booking(ben.id, vec![record(9, 30)]),
        ],
    });

    let notify = Arc::new(NotifyHub::new());
    let mut ana_events = notify.subscribe(ana.id);

    let mut flag = GlobalFlag::new(
        vec![ana.clone(), ben.clone()],
        &store.read(),
        ControllerSettings::default(),
        TeacherSortOrder::default(),
        notify.clone(),
    )
    .unwrap();

    flag.enter_adjustment_mode();
    assert_eq!(flag.get_pending_teachers().len(), 2);

    // Lock everyone to an 08:00 start; each queue shifts by its own delta.
    let changed = flag.lock_to_adjustment_time(hm(8, 0)).unwrap();
    assert_eq!(changed, 3);
    assert_eq!(flag.get_lock_status_time(hm(8, 0)).matched, 2);

    let report = flag.submit(&store).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.applied.len(), 3);
    assert_eq!(flag.state(), SessionState::Idle);

    // The fresh read reproduces exactly what the engine shows.
    flag.sync_from_snapshot(store.read()).unwrap();
    let ana_queue = flag.queue(&ana.id).unwrap();
    assert_eq!(ana_queue.get_earliest_event_time(), Some(at(8, 0)));
    assert_eq!(ana_queue.get_all_events()[1].date, at(10, 0));
    assert_eq!(
        flag.queue(&ben.id).unwrap().get_earliest_event_time(),
        Some(at(8, 0))
    );

    // The teacher's channel saw the shift and the commit.
    let mut saw_shift = false;
    let mut saw_commit = false;
    while let Ok(event) = ana_events.try_recv() {
        match event {
            QueueEvent::TimeShifted { changed, .. } => {
                assert_eq!(changed, 2);
                saw_shift = true;
            }
            QueueEvent::Committed { applied, .. } => {
                assert_eq!(applied, 2);
                saw_commit = true;
            }
            _ => {}
        }
    }
    assert!(saw_shift);
    assert!(saw_commit);
}

#[tokio::test]
async fn snapshot_during_session_lands_after_exit() {
    let ana = teacher("ana");
    let store = SnapshotStore::new(DaySnapshot {
        day: day(),
        bookings: vec![booking(ana.id, vec![record(9, 0)])],
    });

    let mut flag = GlobalFlag::new(
        vec![ana.clone()],
        &store.read(),
        ControllerSettings::default(),
        TeacherSortOrder::default(),
        Arc::new(NotifyHub::new()),
    )
    .unwrap();

    flag.enter_adjustment_mode();
    flag.adjust_time(hm(8, 0)).unwrap();

    // Another operator reschedules in the background.
    {
        let mut snapshot = store.snapshot.lock().unwrap();
        snapshot.bookings[0].lessons[0].events[0].date = at(13, 0);
    }
    flag.sync_from_snapshot(store.read()).unwrap();

    // The in-progress edit is untouched until the session ends.
    assert_eq!(
        flag.queue(&ana.id).unwrap().get_earliest_event_time(),
        Some(at(8, 0))
    );
    flag.exit_adjustment_mode().unwrap();
    assert_eq!(
        flag.queue(&ana.id).unwrap().get_earliest_event_time(),
        Some(at(13, 0))
    );
    assert_eq!(flag.get_changed_events_count(), 0);
}

#[tokio::test]
async fn optimistic_placeholder_is_confirmed_by_later_snapshot() {
    let ana = teacher("ana");
    let store = SnapshotStore::new(DaySnapshot {
        day: day(),
        bookings: vec![booking(ana.id, vec![record(9, 0)])],
    });

    let mut flag = GlobalFlag::new(
        vec![ana.clone()],
        &store.read(),
        ControllerSettings::default(),
        TeacherSortOrder::default(),
        Arc::new(NotifyHub::new()),
    )
    .unwrap();

    // Operator books a new lesson; the UI places it before persistence
    // round-trips.
    let template = flag.queue(&ana.id).unwrap().get_all_events()[0].clone();
    let placeholder = EventNode {
        id: Ulid::new(),
        date: at(15, 0),
        provenance: Provenance::Optimistic,
        ..template
    };
    flag.insert_event(&ana.id, placeholder.clone()).unwrap();

    // A refresh that does not yet know the placeholder keeps it.
    flag.sync_from_snapshot(store.read()).unwrap();
    let queue = flag.queue(&ana.id).unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(
        queue.find_by_id(&placeholder.id).unwrap().provenance,
        Provenance::Optimistic
    );

    // Persistence confirms it (at a slightly different slot) — the
    // snapshot's copy wins.
    {
        let mut snapshot = store.snapshot.lock().unwrap();
        snapshot.bookings[0].lessons[0].events.push(EventRecord {
            id: placeholder.id,
            date: at(15, 30),
            duration_min: 60,
            location: "North beach".into(),
            status: EventStatus::Planned,
        });
    }
    flag.sync_from_snapshot(store.read()).unwrap();
    let queue = flag.queue(&ana.id).unwrap();
    assert_eq!(queue.len(), 2);
    let confirmed = queue.find_by_id(&placeholder.id).unwrap();
    assert_eq!(confirmed.provenance, Provenance::Confirmed);
    assert_eq!(confirmed.date, at(15, 30));
}

#[test]
fn build_is_deterministic_for_a_given_snapshot() {
    let ana = teacher("ana");
    let ben = teacher("ben");
    let snapshot = DaySnapshot {
        day: day(),
        bookings: vec![
            booking(ana.id, vec![record(10, 0), record(9, 0)]),
            booking(ben.id, vec![record(9, 30)]),
        ],
    };
    let roster = vec![ana.clone(), ben.clone()];
    let order = TeacherSortOrder::new([ben.id, ana.id]);

    let a = build_teacher_queues(&roster, &snapshot, &ControllerSettings::default(), &order)
        .unwrap();
    let b = build_teacher_queues(&roster, &snapshot, &ControllerSettings::default(), &order)
        .unwrap();
    let views_a: Vec<_> = a.iter().map(|q| q.view()).collect();
    let views_b: Vec<_> = b.iter().map(|q| q.view()).collect();
    assert_eq!(views_a, views_b);
    assert_eq!(views_a[0].teacher.id, ben.id);
    assert_eq!(views_a[1].events[0].date, at(9, 0));
}
