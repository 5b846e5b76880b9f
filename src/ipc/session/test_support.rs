//! Per-thread event capture so session tests can assert on emitted events
//! without touching stdout.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::ipc::protocol::IpcEvent;

#[derive(Default)]
struct EventSink {
    per_thread: HashMap<std::thread::ThreadId, Vec<IpcEvent>>,
}

static EVENT_SINK: OnceLock<Mutex<EventSink>> = OnceLock::new();

pub(super) fn capture_test_event(event: &IpcEvent) -> bool {
    if let Some(sink) = EVENT_SINK.get() {
        if let Ok(mut events) = sink.lock() {
            events
                .per_thread
                .entry(std::thread::current().id())
                .or_default()
                .push(event.clone());
            return true;
        }
    }
    false
}

#[allow(dead_code)]
pub(super) fn init_event_sink() {
    let _ = EVENT_SINK.get_or_init(|| Mutex::new(EventSink::default()));
}

#[allow(dead_code)]
pub(super) fn event_snapshot() -> usize {
    init_event_sink();
    let current = std::thread::current().id();
    EVENT_SINK
        .get()
        .and_then(|sink| {
            sink.lock()
                .ok()
                .and_then(|events| events.per_thread.get(&current).map(Vec::len))
        })
        .unwrap_or(0)
}

#[allow(dead_code)]
pub(super) fn events_since(start: usize) -> Vec<IpcEvent> {
    let current = std::thread::current().id();
    EVENT_SINK
        .get()
        .and_then(|sink| {
            sink.lock().ok().and_then(|events| {
                events
                    .per_thread
                    .get(&current)
                    .map(|thread_events| thread_events.iter().skip(start).cloned().collect())
            })
        })
        .unwrap_or_default()
}
