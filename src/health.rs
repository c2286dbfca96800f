//! Whether the agent looks alive from the outside.

use crate::store::AgentMemory;

const SECS_PER_DAY: i64 = 86_400;

/// Errors logged this close before the last event still count against it.
const ERROR_GRACE_SECS: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Working,
    /// No event inside the expected receive period.
    Quiet,
    /// An error was recorded after (or just before) the last event.
    Failing,
}

impl Health {
    pub fn is_working(self) -> bool {
        self == Health::Working
    }
}

/// An agent is working when it produced an event within the expected period
/// and has not logged an error since.
pub fn check(memory: &AgentMemory, expected_receive_period_in_days: u32, now: i64) -> Health {
    let Some(last_event) = memory.last_event_at else {
        return Health::Quiet;
    };
    if last_event <= now - i64::from(expected_receive_period_in_days) * SECS_PER_DAY {
        return Health::Quiet;
    }
    match memory.last_error_at {
        Some(err) if err > last_event - ERROR_GRACE_SECS => Health::Failing,
        _ => Health::Working,
    }
}
