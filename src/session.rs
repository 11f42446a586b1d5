use tracing::debug;

use crate::commands::executable::Executable;
use crate::commands::registry::Dispatch;
use crate::commands::{Action, Command, CommandError, Context};
use crate::frame::Frame;
use crate::store::Store;

/// Per-connection state: the selected database, whether the client authenticated, and the
/// commands queued by an open `MULTI`.
///
/// Every request goes through `handle`, which checks the authentication gate, queues the
/// command when a transaction is open, and otherwise runs it against the store.
#[derive(Debug)]
pub struct Session {
    db: usize,
    password: Option<String>,
    authenticated: bool,
    transaction: Option<Vec<Command>>,
    action: Option<Action>,
}

impl Session {
    /// Without a password every connection starts authenticated.
    pub fn new(password: Option<String>) -> Session {
        Session {
            db: 0,
            authenticated: password.is_none(),
            password,
            transaction: None,
            action: None,
        }
    }

    /// The database commands run against.
    pub fn db(&self) -> usize {
        self.db
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// What the connection must do after writing the last reply, if anything.
    pub fn take_action(&mut self) -> Option<Action> {
        self.action.take()
    }

    /// Handles one request and returns its reply. Empty requests get no reply at all.
    pub fn handle(&mut self, frame: Frame, store: &Store) -> Option<Frame> {
        match &frame {
            Frame::Array(parts) if parts.is_empty() => return None,
            // Malformed input was already turned into an error reply by the codec.
            Frame::Error(_) => return Some(frame),
            _ => {}
        }

        let reply = match Command::try_from(frame) {
            Ok(cmd) => self.dispatch(cmd, store),
            Err(err) => Err(err),
        };

        Some(reply.unwrap_or_else(Frame::from))
    }

    fn dispatch(&mut self, cmd: Command, store: &Store) -> Result<Frame, CommandError> {
        if !self.authenticated && !matches!(cmd.dispatch(), Dispatch::Auth) {
            return Err(CommandError::NotPermitted);
        }

        match cmd.dispatch() {
            Dispatch::Auth => self.auth(cmd),
            Dispatch::Multi => {
                // A second MULTI keeps what was queued so far.
                self.transaction.get_or_insert_with(Vec::new);
                Ok(Frame::ok())
            }
            Dispatch::Exec => self.exec(store),
            Dispatch::Discard => match self.transaction.take() {
                Some(queued) => {
                    debug!("Discarding {} queued commands", queued.len());
                    Ok(Frame::ok())
                }
                None => Err(CommandError::DiscardWithoutMulti),
            },
            Dispatch::Store(_) => match self.transaction.as_mut() {
                Some(queued) => {
                    queued.push(cmd);
                    Ok(Frame::Simple("QUEUED".to_string()))
                }
                None => self.with_context(store, |ctx| cmd.exec(ctx)),
            },
        }
    }

    fn auth(&mut self, cmd: Command) -> Result<Frame, CommandError> {
        let mut parser = cmd.parser();
        let candidate = parser.next_bytes()?;

        let accepted = self
            .password
            .as_ref()
            .map_or(true, |password| password.as_bytes() == &candidate[..]);

        self.authenticated = accepted;

        if accepted {
            Ok(Frame::ok())
        } else {
            Err(CommandError::InvalidPassword)
        }
    }

    fn exec(&mut self, store: &Store) -> Result<Frame, CommandError> {
        let queued = self
            .transaction
            .take()
            .ok_or(CommandError::ExecWithoutMulti)?;

        debug!("Executing {} queued commands", queued.len());

        let replies = self.with_context(store, |ctx| {
            queued
                .into_iter()
                .map(|cmd| cmd.exec(ctx).unwrap_or_else(Frame::from))
                .collect()
        });

        Ok(Frame::Array(replies))
    }

    /// Runs `f` while holding the store lock, so no other connection can interleave with
    /// what it does. A `SELECT` run by `f` moves every later command to the new database, and
    /// the session keeps the database selected last.
    fn with_context<F, R>(&mut self, store: &Store, f: F) -> R
    where
        F: FnOnce(&mut Context<'_, '_>) -> R,
    {
        let mut guard = store.lock();
        let mut ctx = Context::new(&mut guard, self.db);

        let result = f(&mut ctx);

        self.db = ctx.db;
        if let Some(action) = ctx.action {
            self.action = Some(action);
        }

        result
    }
}
