use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap};

///
/// EventState
/// Ephemeral, in-memory counters for split and read operations.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub entities: BTreeMap<String, EntityCounters>,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventOps {
    // Splitter
    pub split_calls: u64,
    pub split_keys_scanned: u64,
    pub ranges_emitted: u64,
    pub readers_emitted: u64,

    // Readers
    pub pages_fetched: u64,
    pub rows_scanned: u64,
    pub rows_filtered: u64,
    pub readers_exhausted: u64,
}

///
/// EntityCounters
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EntityCounters {
    pub split_calls: u64,
    pub ranges_emitted: u64,
    pub pages_fetched: u64,
    pub rows_scanned: u64,
    pub rows_filtered: u64,
}

///
/// EventReport
/// Point-in-time copy of the metrics state.
///

pub type EventReport = EventState;

// One state per thread: readers on different workers never share counters.
thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Copy this thread's metrics state.
pub(crate) fn report() -> EventReport {
    with_state(Clone::clone)
}

/// Reset all counters on this thread.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}
