use chrono::NaiveTime;
use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    UnknownTeacher(Ulid),
    InvalidState {
        op: &'static str,
        state: &'static str,
    },
    InvalidTime(String),
    OutsideWindow(NaiveTime),
    LimitExceeded(&'static str),
    CommitFailed(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::UnknownTeacher(id) => write!(f, "unknown teacher: {id}"),
            EngineError::InvalidState { op, state } => {
                write!(f, "{op} is not valid while {state}")
            }
            EngineError::InvalidTime(s) => write!(f, "not a valid HH:MM time: {s:?}"),
            EngineError::OutsideWindow(t) => {
                write!(f, "time {t} is outside the allowed window")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::CommitFailed(e) => write!(f, "bulk write failed: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
