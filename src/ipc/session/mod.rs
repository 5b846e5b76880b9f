//! Host session runtime: stdin commands in, JSON events out, one composer
//! per attached surface.

mod event_processing;
mod event_sink;
mod loop_runtime;
mod state;
mod stdin_reader;
#[cfg(any(test, feature = "mutants"))]
mod test_support;

use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use crate::compose::Composer;
use crate::config::AppConfig;

use event_sink::send_event;

/// How long the loop waits for a command before draining composer events.
/// Keeps transcript delivery and auto-submit latency bounded without
/// spinning.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Session state shared by the command handlers.
pub(crate) struct IpcState {
    pub(crate) config: AppConfig,
    pub(crate) composer: Composer,
    /// Last input level sent to the host, to gate repeat emissions.
    pub(crate) last_level_db: Option<f32>,
    pub(crate) exit_requested: bool,
}

/// Run a session until the host closes stdin or sends `exit`.
pub fn run_session(config: AppConfig) {
    let mut state = IpcState::new(config);
    state.emit_capabilities();

    let (command_tx, command_rx) = std::sync::mpsc::channel();
    let _reader = stdin_reader::spawn_stdin_reader(command_tx);

    loop {
        match command_rx.recv_timeout(IDLE_POLL) {
            Ok(command) => loop_runtime::handle_command(&mut state, command),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("host closed stdin; ending session");
                break;
            }
        }
        loop_runtime::drain_composer(&mut state);
        if state.exit_requested {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::attachments::FileDescriptor;
    use crate::compose::ComposerOptions;
    use crate::ipc::protocol::{IpcCommand, IpcEvent};

    fn test_state() -> IpcState {
        test_support::init_event_sink();
        IpcState::for_tests(AppConfig::default(), Composer::new(ComposerOptions::default()))
    }

    #[test]
    fn set_text_emits_composed_with_derived_action() {
        let mut state = test_state();
        let start = test_support::event_snapshot();
        loop_runtime::handle_command(
            &mut state,
            IpcCommand::SetText {
                text: "hello".into(),
            },
        );
        let events = test_support::events_since(start);
        let [IpcEvent::Composed {
            text,
            primary_action,
            action_enabled,
            ..
        }] = events.as_slice()
        else {
            panic!("expected one composed event, got {events:?}");
        };
        assert_eq!(text, "hello");
        assert_eq!(primary_action, "submit");
        assert!(*action_enabled);
    }

    #[test]
    fn attach_and_remove_round_trip() {
        let mut state = test_state();
        let start = test_support::event_snapshot();
        loop_runtime::handle_command(
            &mut state,
            IpcCommand::AttachFiles {
                files: vec![FileDescriptor {
                    name: "a.png".into(),
                    media_type: "image/png".into(),
                    size: 7,
                }],
            },
        );
        loop_runtime::handle_command(&mut state, IpcCommand::RemoveFile { index: 0 });
        let events = test_support::events_since(start);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], IpcEvent::Attachments { attachments } if attachments.len() == 1));
        assert!(matches!(&events[1], IpcEvent::Attachments { attachments } if attachments.is_empty()));
    }

    #[test]
    fn voice_commands_without_voice_surface_unavailable() {
        let mut state = test_state();
        let start = test_support::event_snapshot();
        loop_runtime::handle_command(&mut state, IpcCommand::StartVoice);
        let events = test_support::events_since(start);
        assert!(matches!(
            events.as_slice(),
            [IpcEvent::VoiceUnavailable { .. }]
        ));
    }

    #[test]
    fn submit_emits_submitted_then_cleared_composed() {
        let mut state = test_state();
        loop_runtime::handle_command(
            &mut state,
            IpcCommand::SetText {
                text: "send it".into(),
            },
        );
        let start = test_support::event_snapshot();
        loop_runtime::handle_command(&mut state, IpcCommand::Submit);
        let events = test_support::events_since(start);
        assert!(matches!(
            &events[0],
            IpcEvent::Submitted { text, .. } if text == "send it"
        ));
        assert!(matches!(
            &events[1],
            IpcEvent::Composed { text, .. } if text.is_empty()
        ));
    }

    #[test]
    fn exit_command_requests_shutdown() {
        let mut state = test_state();
        loop_runtime::handle_command(&mut state, IpcCommand::Exit);
        assert!(state.exit_requested);
    }
}
