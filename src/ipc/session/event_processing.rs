//! Translation from composer notifications to wire events.

use super::send_event;
use crate::compose::{Composer, ComposerEvent};
use crate::ipc::protocol::IpcEvent;

pub(super) fn emit_composer_events(composer: &Composer, events: Vec<ComposerEvent>) {
    for event in events {
        send_event(&wire_event(composer, event));
    }
}

fn wire_event(composer: &Composer, event: ComposerEvent) -> IpcEvent {
    match event {
        ComposerEvent::VoiceStarted => IpcEvent::VoiceStart,
        ComposerEvent::VoiceEnded { error } => IpcEvent::VoiceEnd { error },
        ComposerEvent::VoiceUnavailable { message } => IpcEvent::VoiceUnavailable { message },
        ComposerEvent::TranscriptObserved { text } => IpcEvent::Transcript { text },
        ComposerEvent::VoiceFailed {
            attempt,
            terminal,
            message,
        } => IpcEvent::TranscriptFailed {
            attempt,
            terminal,
            message,
        },
        ComposerEvent::Composed { text } => {
            // The primary action rides along with every text change so the
            // surface renders it without recomputing state.
            let action = composer.primary_action();
            IpcEvent::Composed {
                text,
                attachment_count: composer.attachments().len(),
                primary_action: action.intent.label().to_string(),
                action_enabled: action.enabled,
            }
        }
        ComposerEvent::AttachmentsChanged { attachments } => IpcEvent::Attachments { attachments },
        ComposerEvent::ValidationFailed { message } => IpcEvent::ValidationFailed { message },
        ComposerEvent::Submitted { text, attachments } => IpcEvent::Submitted { text, attachments },
    }
}
