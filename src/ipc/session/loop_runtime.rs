//! Command dispatch and non-blocking event draining for the session loop.

use std::time::Instant;

use super::event_processing::emit_composer_events;
use super::{send_event, IpcState};
use crate::ipc::protocol::{IpcCommand, IpcEvent};

pub(super) fn handle_command(state: &mut IpcState, command: IpcCommand) {
    match command {
        IpcCommand::SetText { text } => {
            let events = state.composer.set_text(text);
            emit_composer_events(&state.composer, events);
        }
        IpcCommand::StartVoice => {
            let events = state.composer.start_voice();
            emit_composer_events(&state.composer, events);
        }
        IpcCommand::StopVoice => {
            // Transcript/failure events surface through the drain below.
            state.composer.stop_voice();
        }
        IpcCommand::RetryVoice => {
            state.composer.retry_voice();
        }
        IpcCommand::ResetVoice => {
            state.composer.reset_voice();
        }
        IpcCommand::AttachFiles { files } => {
            let events = state.composer.select_files(files);
            emit_composer_events(&state.composer, events);
        }
        IpcCommand::RemoveFile { index } => {
            let events = state.composer.remove_file(index);
            emit_composer_events(&state.composer, events);
        }
        IpcCommand::Submit => {
            let events = state.composer.submit();
            emit_composer_events(&state.composer, events);
        }
        IpcCommand::GetCapabilities => {
            state.emit_capabilities();
        }
        IpcCommand::Exit => {
            state.exit_requested = true;
        }
    }
}

/// Drain pipeline events and due auto-submissions without blocking.
pub(super) fn drain_composer(state: &mut IpcState) {
    let events = state.composer.tick(Instant::now());
    emit_composer_events(&state.composer, events);

    // Surface the live meter only while it changes, so an idle session stays
    // quiet on the wire.
    let level = if state.composer.is_recording() {
        state.composer.voice_level_db()
    } else {
        None
    };
    if level != state.last_level_db {
        if let Some(db) = level {
            send_event(&IpcEvent::VoiceLevel { db });
        }
        state.last_level_db = level;
    }
}
