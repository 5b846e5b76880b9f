use std::io::{self, Write};

#[cfg(any(test, feature = "mutants"))]
use super::test_support;
use crate::ipc::protocol::IpcEvent;

pub(super) fn send_event(event: &IpcEvent) {
    #[cfg(any(test, feature = "mutants"))]
    if test_support::capture_test_event(event) {
        return;
    }
    match serde_json::to_string(event) {
        Ok(json) => {
            let mut stdout = io::stdout().lock();
            if let Err(err) = writeln!(stdout, "{json}") {
                tracing::debug!("event sink write failed: {err}");
                return;
            }
            if let Err(err) = stdout.flush() {
                tracing::debug!("event sink flush failed: {err}");
            }
        }
        Err(err) => {
            tracing::debug!("event serialization failed: {err}");
        }
    }
}
