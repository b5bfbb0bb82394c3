//! Wire Codec
//!
//! Datagrams are ASCII text: an integer command tag followed by positional
//! arguments, separated by `:` or `|`. Consecutive delimiters collapse, so
//! no empty tokens are ever produced. A datagram whose first token is not an
//! integer is dropped by the caller with a warning and no reply; senders can
//! never assume a reply to malformed input.

use crate::error::ProtocolError;

/// Maximum size of a single datagram in bytes.
pub const MAX_DATAGRAM: usize = 1024;

/// Argument delimiters accepted on the wire.
const DELIMITERS: [char; 2] = [':', '|'];

/// Integer tags of the wire commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTag {
    Term,
    Query,
    Ack,
    SendFile,
    Register,
    CreateLink,
}

impl CommandTag {
    pub fn from_wire(tag: i64) -> Result<Self, ProtocolError> {
        match tag {
            0 => Ok(CommandTag::Term),
            1 => Ok(CommandTag::Query),
            2 => Ok(CommandTag::Ack),
            3 => Ok(CommandTag::SendFile),
            4 => Ok(CommandTag::Register),
            5 => Ok(CommandTag::CreateLink),
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }

    pub fn to_wire(self) -> i64 {
        match self {
            CommandTag::Term => 0,
            CommandTag::Query => 1,
            CommandTag::Ack => 2,
            CommandTag::SendFile => 3,
            CommandTag::Register => 4,
            CommandTag::CreateLink => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandTag::Term => "TERM",
            CommandTag::Query => "QUERY",
            CommandTag::Ack => "ACK",
            CommandTag::SendFile => "SEND_FILE",
            CommandTag::Register => "REGISTER",
            CommandTag::CreateLink => "CREATE_LINK",
        }
    }
}

/// A parsed inbound datagram: command tag plus positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: CommandTag,
    pub args: Vec<String>,
}

impl Frame {
    /// Parses a raw datagram into a frame.
    ///
    /// The payload is interpreted as (lossy) UTF-8 text; tokens are split on
    /// the wire delimiters with empty tokens collapsed. Anything over
    /// [`MAX_DATAGRAM`] bytes is rejected outright: a truncated prefix can
    /// still parse as a plausible frame, with arguments cut mid-string.
    pub fn parse(payload: &[u8]) -> Result<Frame, ProtocolError> {
        if payload.len() > MAX_DATAGRAM {
            return Err(ProtocolError::Oversized(payload.len()));
        }
        let text = String::from_utf8_lossy(payload);
        let mut tokens = split_tokens(&text).into_iter();
        let head = tokens.next().ok_or(ProtocolError::BadTag)?;
        let tag: i64 = head.parse().map_err(|_| ProtocolError::BadTag)?;
        Ok(Frame {
            tag: CommandTag::from_wire(tag)?,
            args: tokens.collect(),
        })
    }

    /// Rejects the frame unless it carries exactly `expected` arguments.
    pub fn expect_arity(&self, expected: usize) -> Result<(), ProtocolError> {
        if self.args.len() != expected {
            return Err(ProtocolError::WrongArity {
                cmd: self.tag.name(),
                expected,
                got: self.args.len(),
            });
        }
        Ok(())
    }
}

/// Splits on the wire delimiters, trimming tokens and dropping empty ones.
pub fn split_tokens(text: &str) -> Vec<String> {
    text.split(DELIMITERS)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parses a token as a signed integer rank or return code.
pub fn parse_int(token: &str) -> Result<i64, ProtocolError> {
    token
        .trim()
        .parse()
        .map_err(|_| ProtocolError::BadArgument(token.to_owned()))
}

// Outbound frame builders. All sends are fire-and-forget datagrams; these
// just produce the wire text.

pub fn ack(rank: u32) -> String {
    format!("{}:{}", CommandTag::Ack.to_wire(), rank)
}

pub fn query() -> String {
    format!("{}", CommandTag::Query.to_wire())
}

pub fn term(return_code: i32) -> String {
    format!("{}:{}", CommandTag::Term.to_wire(), return_code)
}

pub fn register(rank: u32, iwd: &str, cpus: u32, user: &str) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        CommandTag::Register.to_wire(),
        rank,
        iwd,
        cpus,
        user
    )
}

pub fn create_link(src: &str, dest: &str) -> String {
    format!("{}:{}:{}", CommandTag::CreateLink.to_wire(), src, dest)
}
