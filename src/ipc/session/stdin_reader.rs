use std::io::{self, BufRead};
use std::sync::mpsc::Sender;
use std::thread;

use super::send_event;
use crate::ipc::protocol::{IpcCommand, IpcEvent};

/// Parse one protocol line. Blank lines are skipped by the reader; malformed
/// ones become a recoverable error with the parse failure.
pub(super) fn parse_command(line: &str) -> Result<IpcCommand, String> {
    serde_json::from_str(line).map_err(|err| format!("invalid command: {err}"))
}

pub(super) fn spawn_stdin_reader(tx: Sender<IpcCommand>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        let stdin_lock = stdin.lock();

        for line in stdin_lock.lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match parse_command(trimmed) {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        break; // Session loop has exited.
                    }
                }
                Err(message) => {
                    send_event(&IpcEvent::Error {
                        message,
                        recoverable: true,
                    });
                }
            }
        }

        tracing::debug!("stdin reader thread exiting");
    })
}
