use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::model::Minutes;

/// Inclusive time-of-day window an event start may occupy. Shifts that would
/// land a node outside the window are rejected for that node only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t <= self.end
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
        }
    }
}

/// Operator-facing scheduling knobs, injected by the caller. The engine
/// never hardcodes any of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Minutes one nudge of the proposed time moves it.
    pub step_minutes: Minutes,
    /// Spacing consulted by the shift clamp between consecutive lessons of
    /// one teacher. Not applied at build time — see `build_teacher_queues`.
    pub gap_minutes: Minutes,
    pub duration_cap_one: Minutes,
    pub duration_cap_two: Minutes,
    pub duration_cap_three: Minutes,
    /// Default proposal when a session opens with no prior value.
    pub submit_time: NaiveTime,
    pub submit_location: String,
    pub window: TimeWindow,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            step_minutes: 15,
            gap_minutes: 0,
            duration_cap_one: 120,
            duration_cap_two: 180,
            duration_cap_three: 240,
            submit_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            submit_location: String::new(),
            window: TimeWindow::default(),
        }
    }
}

impl ControllerSettings {
    /// Duration cap for an event, tiered by how many students attend.
    pub fn duration_cap(&self, students: usize) -> Minutes {
        match students {
            0 | 1 => self.duration_cap_one,
            2 => self.duration_cap_two,
            _ => self.duration_cap_three,
        }
    }
}

/// Parse an operator-entered `"HH:MM"` time. Rejecting here keeps invalid
/// times out of the adjustment calls entirely.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime, EngineError> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| EngineError::InvalidTime(s.to_string()))
}
