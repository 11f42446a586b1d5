pub mod executable;
pub mod keys;
pub mod lists;
pub mod registry;
pub mod server;
pub mod sets;
pub mod sort;
pub mod strings;
pub mod zsets;

use bytes::Bytes;
use std::{str, vec};
use thiserror::Error as ThisError;

use crate::frame::Frame;
use crate::store::{parse_score, Database, ScoreBound, StoreError, StoreGuard};

use registry::{CommandSpec, Dispatch};

/// A request resolved against the command table, with its arguments. The arity was already
/// checked when the command was built, queued or not.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub spec: &'static CommandSpec,
    pub args: Vec<Bytes>,
}

impl Command {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn dispatch(&self) -> Dispatch {
        self.spec.dispatch
    }

    pub(crate) fn parser(self) -> CommandParser {
        CommandParser {
            name: self.spec.name,
            parts: self.args.into_iter(),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = CommandError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Requests always come as arrays, inline ones included.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(CommandParserError::InvalidFrame {
                    expected: "array".to_string(),
                    actual: frame,
                }
                .into())
            }
        };

        let mut parts = frames
            .into_iter()
            .map(|frame| match frame {
                Frame::Bulk(bytes) => Ok(bytes),
                Frame::Simple(s) => Ok(Bytes::from(s)),
                frame => Err(CommandParserError::InvalidFrame {
                    expected: "simple or bulk string".to_string(),
                    actual: frame,
                }),
            })
            .collect::<Result<Vec<Bytes>, CommandParserError>>()?
            .into_iter();

        let name = parts.next().ok_or(CommandParserError::EndOfStream)?;
        let name = str::from_utf8(&name).map_err(CommandParserError::InvalidUTF8String)?;

        let spec = registry::lookup(name).ok_or_else(|| CommandParserError::UnknownCommand {
            command: name.to_lowercase(),
        })?;

        let args: Vec<Bytes> = parts.collect();
        if !spec.arity.accepts(args.len()) {
            return Err(CommandError::WrongArity(spec.name));
        }

        Ok(Command { spec, args })
    }
}

/// What the connection must do once the reply to a command went out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Quit,
    Shutdown,
}

/// Everything a command runs against: the locked keyspace and the database the connection
/// has selected. `SELECT` updates `db` in place, so the commands that follow it in the same
/// `EXEC` batch see the new database.
pub struct Context<'a, 's> {
    pub store: &'a mut StoreGuard<'s>,
    pub db: usize,
    pub action: Option<Action>,
}

impl<'a, 's> Context<'a, 's> {
    pub fn new(store: &'a mut StoreGuard<'s>, db: usize) -> Self {
        Self {
            store,
            db,
            action: None,
        }
    }

    /// The selected database.
    pub fn db(&mut self) -> &mut Database {
        self.store.db(self.db)
    }
}

pub struct CommandParser {
    name: &'static str,
    parts: vec::IntoIter<Bytes>,
}

impl CommandParser {
    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        self.parts.next().ok_or(CommandParserError::EndOfStream)
    }

    pub(crate) fn next_string(&mut self) -> Result<String, CommandParserError> {
        let bytes = self.next_bytes()?;
        str::from_utf8(&bytes[..])
            .map(|s| s.to_string())
            .map_err(CommandParserError::InvalidUTF8String)
    }

    /// The next argument, or `None` once every argument was consumed.
    pub(crate) fn next_optional_string(&mut self) -> Result<Option<String>, CommandParserError> {
        if self.parts.len() == 0 {
            return Ok(None);
        }
        self.next_string().map(Some)
    }

    pub(crate) fn next_integer(&mut self) -> Result<i64, CommandError> {
        let bytes = self.next_bytes()?;
        str::from_utf8(&bytes[..])
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(CommandError::NotAnInteger)
    }

    pub(crate) fn next_float(&mut self) -> Result<f64, CommandError> {
        let bytes = self.next_bytes()?;
        str::from_utf8(&bytes[..])
            .ok()
            .and_then(parse_score)
            .ok_or(CommandError::NotAFloat)
    }

    pub(crate) fn next_score_bound(&mut self) -> Result<ScoreBound, CommandError> {
        let bytes = self.next_bytes()?;
        str::from_utf8(&bytes[..])
            .ok()
            .and_then(ScoreBound::parse)
            .ok_or(CommandError::NotAFloat)
    }

    /// Every argument not consumed yet, as strings.
    pub(crate) fn remaining_strings(&mut self) -> Result<Vec<String>, CommandParserError> {
        let mut strings = Vec::with_capacity(self.parts.len());
        while let Some(s) = self.next_optional_string()? {
            strings.push(s);
        }
        Ok(strings)
    }

    /// Every argument not consumed yet.
    pub(crate) fn remaining(&mut self) -> Vec<Bytes> {
        self.parts.by_ref().collect()
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("Protocol error: expected {expected}, got {actual}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
    // Running out of arguments past the arity check means a modifier is missing its value.
    #[error("syntax error")]
    EndOfStream,
}

/// Failures reported back to the client as `-ERR <message>`. None of them affects the
/// connection beyond the failing command.
#[derive(Debug, ThisError)]
pub enum CommandError {
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),
    #[error("operation not permitted")]
    NotPermitted,
    #[error("invalid password")]
    InvalidPassword,
    #[error("syntax error")]
    Syntax,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("value is not a valid float")]
    NotAFloat,
    #[error("EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("'{0}' is handled by the connection and cannot run here")]
    NotExecutable(&'static str),
    #[error(transparent)]
    Parser(#[from] CommandParserError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CommandError> for Frame {
    fn from(err: CommandError) -> Self {
        Frame::Error(format!("ERR {}", err))
    }
}
