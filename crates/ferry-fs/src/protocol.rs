//! Wire codec for ferry-fs
//!
//! Wire format: UTF-8 control lines terminated by `\n` (a preceding `\r` is
//! tolerated), fields joined by a single space. Binary payloads follow an
//! `OK <size>` line (download) or an `upload <name> <size>` line (upload) and
//! are exactly `size` raw bytes with no framing of their own.

use crate::error::{Error, Result};
use std::fmt;

/// Field separator inside a control line. Filenames may not contain it.
pub const DELIMITER: char = ' ';

/// Upper bound on a single control line, terminator included
pub const MAX_LINE_LEN: usize = 8192;

/// Transfer buffer size
pub const CHUNK_SIZE: usize = 4096;

pub const STATUS_OK: &str = "OK";
pub const STATUS_ERROR: &str = "ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    List,
    Delete,
    Rename,
    Download,
    Upload,
    Quit,
}

// Built once; lookups never allocate
static COMMANDS: [(&str, Command); 6] = [
    ("list", Command::List),
    ("delete", Command::Delete),
    ("rename", Command::Rename),
    ("download", Command::Download),
    ("upload", Command::Upload),
    ("quit", Command::Quit),
];

impl Command {
    pub fn from_name(name: &str) -> Option<Self> {
        COMMANDS.iter().find(|(n, _)| *n == name).map(|(_, c)| *c)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::Download => "download",
            Self::Upload => "upload",
            Self::Quit => "quit",
        }
    }

    /// Number of arguments the command takes
    pub fn arity(self) -> usize {
        match self {
            Self::List | Self::Quit => 0,
            Self::Delete | Self::Download => 1,
            Self::Rename | Self::Upload => 2,
        }
    }

    /// The error for a request whose argument count does not fit this command
    pub fn arity_error(self) -> Error {
        Error::invalid(format!(
            "{self} command requires exactly {} argument(s): {}",
            self.arity(),
            self.usage()
        ))
    }

    fn usage(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Delete => "delete <filename>",
            Self::Rename => "rename <oldname> <newname>",
            Self::Download => "download <filename>",
            Self::Upload => "upload <filename> <size>",
            Self::Quit => "quit",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub args: Vec<String>,
}

impl Request {
    /// Check the argument count against the command's arity
    pub fn check_arity(&self) -> Result<()> {
        if self.args.len() != self.command.arity() {
            return Err(self.command.arity_error());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    fn as_str(self) -> &'static str {
        match self {
            Self::Ok => STATUS_OK,
            Self::Error => STATUS_ERROR,
        }
    }
}

/// Strip the line terminator (`\n` or `\r\n`) from a raw control line
pub fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Reject names that would break framing or escape the managed directory
pub fn validate_filename(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid("filename must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(Error::invalid(format!("invalid filename: {name}")));
    }
    if name.contains(DELIMITER) {
        return Err(Error::invalid(format!("filename must not contain spaces: {name}")));
    }
    if name.contains(['\n', '\r', '/', '\\']) {
        return Err(Error::invalid(format!("invalid character in filename: {name:?}")));
    }
    Ok(())
}

pub fn parse_size(field: &str) -> Result<u64> {
    field.parse::<u64>().map_err(|_| Error::invalid("invalid size"))
}

pub fn encode_request(command: Command, args: &[&str]) -> Result<Vec<u8>> {
    let mut line = String::from(command.name());
    for arg in args {
        if arg.is_empty() || arg.contains([DELIMITER, '\n', '\r']) {
            return Err(Error::invalid(format!("cannot encode argument {arg:?}")));
        }
        line.push(DELIMITER);
        line.push_str(arg);
    }
    line.push('\n');
    Ok(line.into_bytes())
}

/// Decode one control line. A blank line yields `None`; leading
/// whitespace before the verb is ignored.
pub fn decode_request(line: &str) -> Result<Option<Request>> {
    let line = trim_line_ending(line).trim_start();
    if line.is_empty() {
        return Ok(None);
    }

    let mut fields = line.split(DELIMITER);
    let verb = fields.next().unwrap_or_default();
    let command = Command::from_name(verb).ok_or_else(|| Error::UnknownCommand(verb.to_string()))?;
    let args = fields.map(str::to_string).collect();

    Ok(Some(Request { command, args }))
}

/// `OK: <message>` or `ERROR: <message>`
pub fn encode_response(status: Status, message: &str) -> Vec<u8> {
    // Messages may echo client input; keep them on one line
    let message = message.replace(['\n', '\r'], " ");
    format!("{}: {message}\n", status.as_str()).into_bytes()
}

/// `OK <size>`, announcing a download payload
pub fn encode_size_line(size: u64) -> Vec<u8> {
    format!("{STATUS_OK}{DELIMITER}{size}\n").into_bytes()
}

/// The `list` reply: a count line, then one name per line
pub fn encode_listing(names: &[String]) -> Vec<u8> {
    let mut out = format!("{}\n", names.len());
    for name in names {
        out.push_str(name);
        out.push('\n');
    }
    out.into_bytes()
}

pub fn parse_count(line: &str) -> Result<usize> {
    trim_line_ending(line)
        .parse()
        .map_err(|_| Error::UnexpectedResponse(line.to_string()))
}

/// Split a status line into its status and the remainder.
///
/// Accepts both `OK: message` and `OK <size>` forms.
pub fn decode_response_line(line: &str) -> Result<(Status, &str)> {
    let line = trim_line_ending(line);
    let (status, rest) = if let Some(rest) = line.strip_prefix(STATUS_OK) {
        (Status::Ok, rest)
    } else if let Some(rest) = line.strip_prefix(STATUS_ERROR) {
        (Status::Error, rest)
    } else {
        return Err(Error::UnexpectedResponse(line.to_string()));
    };

    let rest = if let Some(msg) = rest.strip_prefix(':') {
        msg.trim_start()
    } else if let Some(field) = rest.strip_prefix(DELIMITER) {
        field
    } else if rest.is_empty() {
        rest
    } else {
        return Err(Error::UnexpectedResponse(line.to_string()));
    };

    Ok((status, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_idle() {
        assert_eq!(decode_request("").unwrap(), None);
        assert_eq!(decode_request("\r\n").unwrap(), None);
        assert_eq!(decode_request("   \n").unwrap(), None);
    }

    #[test]
    fn decodes_commands_and_strips_crlf() {
        let req = decode_request("rename a.txt b.txt\r\n").unwrap().unwrap();
        assert_eq!(req.command, Command::Rename);
        assert_eq!(req.args, vec!["a.txt", "b.txt"]);
        req.check_arity().unwrap();

        let req = decode_request("list\n").unwrap().unwrap();
        assert_eq!(req.command, Command::List);
        assert!(req.args.is_empty());
    }

    #[test]
    fn leading_whitespace_before_verb() {
        let req = decode_request("  \tdelete a.txt\n").unwrap().unwrap();
        assert_eq!(req.command, Command::Delete);
        assert_eq!(req.args, vec!["a.txt"]);
        assert_eq!(decode_request(" list").unwrap().unwrap().command, Command::List);
    }

    #[test]
    fn unknown_verb() {
        match decode_request("frobnicate x\n") {
            Err(Error::UnknownCommand(verb)) => assert_eq!(verb, "frobnicate"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn arity_is_checked() {
        let req = decode_request("upload b.txt").unwrap().unwrap();
        assert!(matches!(req.check_arity(), Err(Error::InvalidArguments(_))));

        // a filename with a space splits into too many fields
        let req = decode_request("delete my file.txt").unwrap().unwrap();
        assert!(matches!(req.check_arity(), Err(Error::InvalidArguments(_))));
    }

    #[test]
    fn request_encoding() {
        assert_eq!(encode_request(Command::Upload, &["b.txt", "3"]).unwrap(), b"upload b.txt 3\n");
        assert_eq!(encode_request(Command::Quit, &[]).unwrap(), b"quit\n");
        assert!(encode_request(Command::Delete, &["my file"]).is_err());
        assert!(encode_request(Command::Delete, &[""]).is_err());
    }

    #[test]
    fn filename_rules() {
        validate_filename("a.txt").unwrap();
        validate_filename("..hidden").unwrap();
        for bad in ["", ".", "..", "a b", "a/b", "a\\b", "a\nb"] {
            assert!(validate_filename(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn listing() {
        assert_eq!(encode_listing(&[]), b"0\n");
        let names = vec!["a.txt".to_string(), "b.txt".to_string()];
        assert_eq!(encode_listing(&names), b"2\na.txt\nb.txt\n");
    }

    #[test]
    fn sizes() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("18446744073709551615").unwrap(), u64::MAX);
        for bad in ["", "-1", "5kb", "1.5", " 5"] {
            assert!(parse_size(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn response_lines() {
        assert_eq!(encode_response(Status::Ok, "File deleted: a.txt"), b"OK: File deleted: a.txt\n");
        assert_eq!(encode_response(Status::Error, "bad\nname"), b"ERROR: bad name\n");
        assert_eq!(encode_size_line(5), b"OK 5\n");

        assert_eq!(decode_response_line("OK 5\n").unwrap(), (Status::Ok, "5"));
        assert_eq!(
            decode_response_line("OK: File uploaded: b.txt\r\n").unwrap(),
            (Status::Ok, "File uploaded: b.txt")
        );
        assert_eq!(
            decode_response_line("ERROR: File not found: x").unwrap(),
            (Status::Error, "File not found: x")
        );
        assert!(decode_response_line("3").is_err());
        assert_eq!(parse_count("3\r\n").unwrap(), 3);
        assert!(decode_response_line("OKAY").is_err());
    }
}
