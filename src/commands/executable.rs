use crate::commands::registry::Dispatch;
use crate::commands::{Command, CommandError, Context};
use crate::frame::Frame;

pub trait Executable {
    fn exec(self, ctx: &mut Context<'_, '_>) -> Result<Frame, CommandError>;
}

impl Executable for Command {
    fn exec(self, ctx: &mut Context<'_, '_>) -> Result<Frame, CommandError> {
        match self.dispatch() {
            Dispatch::Store(handler) => handler(ctx, &mut self.parser()),
            // AUTH, MULTI, EXEC and DISCARD change connection state and are never queued.
            Dispatch::Auth | Dispatch::Multi | Dispatch::Exec | Dispatch::Discard => {
                Err(CommandError::NotExecutable(self.name()))
            }
        }
    }
}
