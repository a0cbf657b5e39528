//! Interactive console commands.
//!
//! ```text
//! connect [<ip> <port>]   connect (defaults to the configured server)
//! disconnect              close the connection
//! time                    ask for the server's time
//! name                    ask for the server's name
//! list                    ask for the connected clients
//! send <id> [<message>]   relay <message> (possibly empty) to client <id>
//! help                    show this list
//! quit                    disconnect and exit
//! ```

use thiserror::Error;

pub const HELP: &str = "\
Commands:
  connect [<ip> <port>]   connect to the server
  disconnect              close the connection
  time                    request the server time
  name                    request the server name
  list                    request the client list
  send <id> [<message>]   send a message to client <id>
  help                    show this help
  quit                    disconnect and exit";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `None` means the configured default server address.
    Connect(Option<String>),
    Disconnect,
    Time,
    Name,
    List,
    Send { target: u8, text: String },
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}' (type 'help')")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("client id must be a number between 1 and 255, got '{0}'")]
    BadTarget(String),
}

impl Command {
    /// Parses one line of input.  Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "" => return Ok(None),
            "connect" => Command::Connect(parse_address(rest)?),
            "disconnect" => Command::Disconnect,
            "time" => Command::Time,
            "name" => Command::Name,
            "list" => Command::List,
            "send" => parse_send(rest)?,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn parse_address(rest: &str) -> Result<Option<String>, CommandError> {
    let parts: Vec<&str> = rest.split_whitespace().collect();
    match parts.as_slice() {
        [] => Ok(None),
        [ip, port] if port.parse::<u16>().is_ok() => Ok(Some(format!("{ip}:{port}"))),
        _ => Err(CommandError::Usage("connect [<ip> <port>]")),
    }
}

fn parse_send(rest: &str) -> Result<Command, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::Usage("send <id> [<message>]"));
    }
    // The message may be empty.
    let (id, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let target = id
        .parse::<u8>()
        .ok()
        .filter(|&t| t != 0)
        .ok_or_else(|| CommandError::BadTarget(id.to_string()))?;
    Ok(Command::Send {
        target,
        text: text.trim_start().to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands_parse_case_insensitively() {
        assert_eq!(Command::parse("time"), Ok(Some(Command::Time)));
        assert_eq!(Command::parse("  NAME  "), Ok(Some(Command::Name)));
        assert_eq!(Command::parse("list"), Ok(Some(Command::List)));
        assert_eq!(Command::parse("disconnect"), Ok(Some(Command::Disconnect)));
        assert_eq!(Command::parse("exit"), Ok(Some(Command::Quit)));
        assert_eq!(Command::parse("help"), Ok(Some(Command::Help)));
    }

    #[test]
    fn test_blank_line_is_ignored() {
        assert_eq!(Command::parse("   "), Ok(None));
    }

    #[test]
    fn test_connect_with_and_without_address() {
        assert_eq!(Command::parse("connect"), Ok(Some(Command::Connect(None))));
        assert_eq!(
            Command::parse("connect 10.0.0.5 6026"),
            Ok(Some(Command::Connect(Some("10.0.0.5:6026".to_string()))))
        );
        assert!(matches!(Command::parse("connect 10.0.0.5"), Err(CommandError::Usage(_))));
        assert!(matches!(
            Command::parse("connect 10.0.0.5 notaport"),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn test_send_keeps_message_spacing() {
        assert_eq!(
            Command::parse("send 3 see you  at noon"),
            Ok(Some(Command::Send {
                target: 3,
                text: "see you  at noon".to_string()
            }))
        );
    }

    #[test]
    fn test_send_rejects_bad_target_and_missing_text() {
        assert_eq!(
            Command::parse("send 0 hi"),
            Err(CommandError::BadTarget("0".to_string()))
        );
        assert_eq!(
            Command::parse("send 300 hi"),
            Err(CommandError::BadTarget("300".to_string()))
        );
        assert!(matches!(Command::parse("send"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn test_send_without_text_sends_an_empty_message() {
        assert_eq!(
            Command::parse("send 3"),
            Ok(Some(Command::Send {
                target: 3,
                text: String::new()
            }))
        );
    }

    #[test]
    fn test_unknown_command_is_reported() {
        assert_eq!(
            Command::parse("dance now"),
            Err(CommandError::Unknown("dance".to_string()))
        );
    }
}
