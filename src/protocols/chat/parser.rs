//! Chat protocol parser: command table, line classification and framing.

use bytes::BytesMut;

/// First character of every command line.
pub const COMMAND_PREFIX: char = '/';

/// Recognized command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Current local date and time.
    Time,
    /// Connection counters.
    Stats,
    /// Stop the server after the current event batch.
    Shutdown,
}

/// Command keywords in display order. Keywords are unique.
const COMMANDS: [(&str, Command); 3] = [
    ("/time", Command::Time),
    ("/stats", Command::Stats),
    ("/shutdown", Command::Shutdown),
];

impl Command {
    /// Exact, case-sensitive keyword lookup.
    pub fn lookup(keyword: &str) -> Option<Command> {
        COMMANDS
            .iter()
            .find(|(name, _)| *name == keyword)
            .map(|(_, command)| *command)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Command::Time => "/time",
            Command::Stats => "/stats",
            Command::Shutdown => "/shutdown",
        }
    }

    /// All commands in display order.
    pub fn all() -> impl Iterator<Item = Command> {
        COMMANDS.iter().map(|(_, command)| *command)
    }
}

/// A classified line of client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message<'a> {
    /// Plain text, echoed back.
    Text(&'a str),
    /// A recognized command.
    Command(Command),
    /// Starts with the command prefix but matches no keyword.
    Unknown(&'a str),
}

/// Classify one line (without its trailing newline).
pub fn parse(line: &str) -> Message<'_> {
    if !line.starts_with(COMMAND_PREFIX) {
        return Message::Text(line);
    }

    match Command::lookup(line) {
        Some(command) => Message::Command(command),
        None => Message::Unknown(line),
    }
}

/// Strip a single trailing `\n`, if present.
pub fn strip_newline(input: &[u8]) -> &[u8] {
    input.strip_suffix(b"\n").unwrap_or(input)
}

/// Take the next complete line out of an accumulation buffer.
///
/// Returns the line without its `\n`. When no newline is buffered but the
/// buffer already holds more than `max_line_length` bytes, the whole buffer
/// is returned as one line.
pub fn take_line(buffer: &mut BytesMut, max_line_length: usize) -> Option<BytesMut> {
    if let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let mut line = buffer.split_to(pos + 1);
        line.truncate(pos);
        return Some(line);
    }

    if buffer.len() > max_line_length {
        return Some(buffer.split());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text() {
        assert_eq!(parse("hello"), Message::Text("hello"));
        assert_eq!(parse(""), Message::Text(""));
        assert_eq!(parse(" /time"), Message::Text(" /time"));
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("/time"), Message::Command(Command::Time));
        assert_eq!(parse("/stats"), Message::Command(Command::Stats));
        assert_eq!(parse("/shutdown"), Message::Command(Command::Shutdown));
    }

    #[test]
    fn test_exact_match_only() {
        assert_eq!(parse("/time "), Message::Unknown("/time "));
        assert_eq!(parse("/TIME"), Message::Unknown("/TIME"));
        assert_eq!(parse("/stats now"), Message::Unknown("/stats now"));
        assert_eq!(parse("/"), Message::Unknown("/"));
    }

    #[test]
    fn test_keywords_unique_and_round_trip() {
        let keywords: Vec<_> = Command::all().map(Command::keyword).collect();
        assert_eq!(keywords, ["/time", "/stats", "/shutdown"]);
        for command in Command::all() {
            assert_eq!(Command::lookup(command.keyword()), Some(command));
        }
    }

    #[test]
    fn test_strip_newline() {
        assert_eq!(strip_newline(b"hello\n"), b"hello");
        assert_eq!(strip_newline(b"hello"), b"hello");
        assert_eq!(strip_newline(b"hello\n\n"), b"hello\n");
        assert_eq!(strip_newline(b"\n"), b"");
        assert_eq!(strip_newline(b""), b"");
    }

    #[test]
    fn test_take_line_splits_and_keeps_remainder() {
        let mut buffer = BytesMut::from(&b"one\ntwo\nthr"[..]);

        assert_eq!(take_line(&mut buffer, 64).as_deref(), Some(&b"one"[..]));
        assert_eq!(take_line(&mut buffer, 64).as_deref(), Some(&b"two"[..]));
        assert!(take_line(&mut buffer, 64).is_none());
        assert_eq!(&buffer[..], b"thr");

        buffer.extend_from_slice(b"ee\n");
        assert_eq!(take_line(&mut buffer, 64).as_deref(), Some(&b"three"[..]));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_take_line_empty_line() {
        let mut buffer = BytesMut::from(&b"\n"[..]);
        assert_eq!(take_line(&mut buffer, 64).as_deref(), Some(&b""[..]));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_take_line_overlong_partial() {
        let mut buffer = BytesMut::from(&b"abcdef"[..]);
        assert!(take_line(&mut buffer, 6).is_none());

        buffer.extend_from_slice(b"g");
        assert_eq!(take_line(&mut buffer, 6).as_deref(), Some(&b"abcdefg"[..]));
        assert!(buffer.is_empty());
    }
}
