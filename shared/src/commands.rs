//! Text command protocol for the remote control channel.
//!
//! Commands are newline-terminated lines of space-separated tokens;
//! vector arguments use comma-separated components:
//!
//! ```text
//! push forward
//! release all
//! set position 12,-35,76
//! set rotation 90
//! set ray visible
//! reset
//! ```
//!
//! Bytes accumulate in a [`CommandQueue`] as they arrive from the socket
//! and are consumed one command at a time in arrival order. A malformed
//! command is a fatal protocol error: the server drops the connection
//! rather than trying to resynchronize mid-stream.

use crate::Vec3;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("command is not valid utf-8")]
    NotText,
    #[error("unknown verb {0:?}")]
    UnknownVerb(String),
    #[error("unknown argument {arg:?} for {verb:?}")]
    UnknownArgument { verb: &'static str, arg: String },
    #[error("missing argument for {0:?}")]
    MissingArgument(&'static str),
    #[error("unexpected trailing tokens in {0:?}")]
    TrailingTokens(String),
    #[error("malformed number {0:?}")]
    BadNumber(String),
    #[error("malformed vector {0:?} (expected x,y,z)")]
    BadVector(String),
}

/// One of the four direction controls a client can hold or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    Forward,
    Back,
    Left,
    Right,
}

impl ControlKey {
    pub fn token(self) -> &'static str {
        match self {
            ControlKey::Forward => "forward",
            ControlKey::Back => "back",
            ControlKey::Left => "left",
            ControlKey::Right => "right",
        }
    }

    fn from_token(token: &str) -> Option<ControlKey> {
        match token {
            "forward" => Some(ControlKey::Forward),
            "back" => Some(ControlKey::Back),
            "left" => Some(ControlKey::Left),
            "right" => Some(ControlKey::Right),
            _ => None,
        }
    }
}

/// A fully parsed command from the control stream.
///
/// `SetPosition` and `SetRotation` rewrite the respawn pose, not the live
/// pose. `SetSpeed` and `PushAll` are accepted but have no effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    Push(ControlKey),
    PushAll,
    Release(ControlKey),
    ReleaseAll,
    SetPosition(Vec3),
    SetRotation(f32),
    SetSpeed(f32),
    SetRay(bool),
    Reset,
}

/// FIFO byte buffer accumulating partial command input from the socket.
///
/// Bytes are never reordered; a command is removed from the front only
/// once its terminating newline has arrived.
#[derive(Debug, Default)]
pub struct CommandQueue {
    buf: Vec<u8>,
}

impl CommandQueue {
    pub fn new() -> CommandQueue {
        CommandQueue::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Consumes exactly one command from the front of the queue.
    ///
    /// Returns `Ok(None)` when no complete command is buffered yet. Blank
    /// lines are skipped. A parse failure consumes the offending line and
    /// returns the error; the caller is expected to drop the connection.
    pub fn parse_next_command(&mut self) -> Result<Option<RemoteCommand>, CommandError> {
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
                return Ok(None);
            };

            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let mut line = &line[..line.len() - 1];
            if line.ends_with(b"\r") {
                line = &line[..line.len() - 1];
            }

            let text = std::str::from_utf8(line).map_err(|_| CommandError::NotText)?;
            if text.trim().is_empty() {
                continue;
            }

            return parse_line(text).map(Some);
        }
    }
}

fn parse_line(text: &str) -> Result<RemoteCommand, CommandError> {
    let mut tokens = text.split_whitespace();
    let verb = tokens.next().unwrap_or_default();

    let command = match verb {
        "push" => match tokens.next() {
            Some("all") => RemoteCommand::PushAll,
            arg => RemoteCommand::Push(parse_key("push", arg)?),
        },
        "release" => match tokens.next() {
            Some("all") => RemoteCommand::ReleaseAll,
            arg => RemoteCommand::Release(parse_key("release", arg)?),
        },
        "set" => parse_set(&mut tokens)?,
        "reset" => RemoteCommand::Reset,
        other => return Err(CommandError::UnknownVerb(other.to_string())),
    };

    if tokens.next().is_some() {
        return Err(CommandError::TrailingTokens(text.to_string()));
    }

    Ok(command)
}

fn parse_set<'a, I>(tokens: &mut I) -> Result<RemoteCommand, CommandError>
where
    I: Iterator<Item = &'a str>,
{
    let target = tokens.next().ok_or(CommandError::MissingArgument("set"))?;

    match target {
        "position" => {
            let raw = tokens
                .next()
                .ok_or(CommandError::MissingArgument("set position"))?;
            Ok(RemoteCommand::SetPosition(parse_vector(raw)?))
        }
        "rotation" => {
            let raw = tokens
                .next()
                .ok_or(CommandError::MissingArgument("set rotation"))?;
            Ok(RemoteCommand::SetRotation(parse_number(raw)?))
        }
        "speed" => {
            let raw = tokens
                .next()
                .ok_or(CommandError::MissingArgument("set speed"))?;
            Ok(RemoteCommand::SetSpeed(parse_number(raw)?))
        }
        "ray" => match tokens.next() {
            Some("visible") => Ok(RemoteCommand::SetRay(true)),
            Some("hidden") => Ok(RemoteCommand::SetRay(false)),
            Some(other) => Err(CommandError::UnknownArgument {
                verb: "set ray",
                arg: other.to_string(),
            }),
            None => Err(CommandError::MissingArgument("set ray")),
        },
        other => Err(CommandError::UnknownArgument {
            verb: "set",
            arg: other.to_string(),
        }),
    }
}

fn parse_key(verb: &'static str, arg: Option<&str>) -> Result<ControlKey, CommandError> {
    let arg = arg.ok_or(CommandError::MissingArgument(verb))?;
    ControlKey::from_token(arg).ok_or_else(|| CommandError::UnknownArgument {
        verb,
        arg: arg.to_string(),
    })
}

fn parse_number(raw: &str) -> Result<f32, CommandError> {
    raw.parse::<f32>()
        .map_err(|_| CommandError::BadNumber(raw.to_string()))
}

fn parse_vector(raw: &str) -> Result<Vec3, CommandError> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 3 {
        return Err(CommandError::BadVector(raw.to_string()));
    }

    Ok(Vec3::new(
        parse_number(parts[0])?,
        parse_number(parts[1])?,
        parse_number(parts[2])?,
    ))
}
