//! Chat protocol dispatch and command handlers.

use super::parser::{self, Command, Message};
use crate::state::ServerState;
use bytes::{BufMut, BytesMut};
use chrono::Local;

/// Response to `/shutdown`.
pub const FAREWELL: &str = "Server is shutting down...";

const UNKNOWN_COMMAND: &str = "Unknown command: ";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Produce the response text for one line of input.
///
/// Every line maps to some response; this never fails.
pub fn process(line: &str, state: &mut ServerState) -> String {
    match parser::parse(line) {
        Message::Text(text) => text.to_string(),
        Message::Command(command) => execute(command, state),
        Message::Unknown(line) => format!("{UNKNOWN_COMMAND}{line}"),
    }
}

/// Run a recognized command.
pub fn execute(command: Command, state: &mut ServerState) -> String {
    match command {
        Command::Time => current_time(),
        Command::Stats => {
            let stats = state.stats();
            format!(
                "Total users: {}, Current users: {}",
                stats.total_connections_accepted, stats.current_connections
            )
        }
        Command::Shutdown => {
            state.request_shutdown();
            FAREWELL.to_string()
        }
    }
}

/// Local time as `YYYY-MM-DD HH:MM:SS`.
pub fn current_time() -> String {
    Local::now().format(TIME_FORMAT).to_string()
}

/// Handle one raw message and append the newline-terminated response to
/// `output`.
///
/// A single trailing `\n` is stripped from the input. Invalid UTF-8 is
/// decoded lossily.
pub fn respond(input: &[u8], state: &mut ServerState, output: &mut BytesMut) {
    let line = String::from_utf8_lossy(parser::strip_newline(input));
    let response = process(&line, state);

    output.reserve(response.len() + 1);
    output.put_slice(response.as_bytes());
    output.put_u8(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn test_echo() {
        let mut state = ServerState::new();
        assert_eq!(process("hello", &mut state), "hello");
        assert_eq!(process("hello world  ", &mut state), "hello world  ");
        assert_eq!(process("", &mut state), "");
    }

    #[test]
    fn test_echo_idempotent() {
        let mut state = ServerState::new();
        let first = process("same line", &mut state);
        let second = process("same line", &mut state);
        assert_eq!(first, second);
    }

    #[test]
    fn test_time_format() {
        let mut state = ServerState::new();
        let response = process("/time", &mut state);

        assert_eq!(response.len(), 19);
        assert!(NaiveDateTime::parse_from_str(&response, TIME_FORMAT).is_ok());
        let bytes = response.as_bytes();
        assert_eq!(bytes[4], b'-');
        assert_eq!(bytes[10], b' ');
        assert_eq!(bytes[13], b':');
    }

    #[test]
    fn test_stats() {
        let mut state = ServerState::new();
        state.connection_opened();
        state.connection_opened();
        state.connection_opened();
        state.connection_closed();

        assert_eq!(
            process("/stats", &mut state),
            "Total users: 3, Current users: 2"
        );
    }

    #[test]
    fn test_shutdown() {
        let mut state = ServerState::new();
        assert_eq!(process("/shutdown", &mut state), FAREWELL);
        assert!(!state.is_running());
    }

    #[test]
    fn test_unknown_command() {
        let mut state = ServerState::new();
        assert_eq!(process("/bogus", &mut state), "Unknown command: /bogus");
        assert_eq!(process("/", &mut state), "Unknown command: /");
        assert_eq!(process("/time ", &mut state), "Unknown command: /time ");
        assert_eq!(process("/TIME", &mut state), "Unknown command: /TIME");
        assert_eq!(
            process("/shutdown please", &mut state),
            "Unknown command: /shutdown please"
        );
        assert!(state.is_running());
    }

    #[test]
    fn test_respond_appends_newline() {
        let mut state = ServerState::new();
        let mut output = BytesMut::new();

        respond(b"hello\n", &mut state, &mut output);
        respond(b"/bogus", &mut state, &mut output);
        respond(b"\n", &mut state, &mut output);

        assert_eq!(&output[..], b"hello\nUnknown command: /bogus\n\n");
    }

    #[test]
    fn test_respond_strips_only_one_newline() {
        let mut state = ServerState::new();
        let mut output = BytesMut::new();

        respond(b"a\nb\n", &mut state, &mut output);
        assert_eq!(&output[..], b"a\nb\n");
    }
}
