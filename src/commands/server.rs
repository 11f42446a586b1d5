use bytes::Bytes;
use tracing::info;

use crate::commands::{Action, CommandError, CommandParser, Context};
use crate::frame::Frame;

/// Ref: <https://redis.io/docs/latest/commands/ping/>
pub fn ping(_ctx: &mut Context<'_, '_>, _parser: &mut CommandParser) -> Result<Frame, CommandError> {
    Ok(Frame::Simple("PONG".to_string()))
}

/// Acknowledges, then the connection is closed once the reply is written.
///
/// Ref: <https://redis.io/docs/latest/commands/quit/>
pub fn quit(ctx: &mut Context<'_, '_>, _parser: &mut CommandParser) -> Result<Frame, CommandError> {
    ctx.action = Some(Action::Quit);
    Ok(Frame::ok())
}

/// Stops the server. The keyspace is saved once the listener stopped accepting.
///
/// Ref: <https://redis.io/docs/latest/commands/shutdown/>
pub fn shutdown(
    ctx: &mut Context<'_, '_>,
    _parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    info!("Shutdown requested by a client");
    ctx.action = Some(Action::Shutdown);
    Ok(Frame::ok())
}

/// Writes the whole keyspace to the snapshot file before replying.
///
/// Ref: <https://redis.io/docs/latest/commands/save/>
pub fn save(ctx: &mut Context<'_, '_>, _parser: &mut CommandParser) -> Result<Frame, CommandError> {
    ctx.store.save()?;
    Ok(Frame::ok())
}

/// Same as `SAVE`, acknowledged the way a background save is.
///
/// Ref: <https://redis.io/docs/latest/commands/bgsave/>
pub fn bgsave(ctx: &mut Context<'_, '_>, _parser: &mut CommandParser) -> Result<Frame, CommandError> {
    ctx.store.save()?;
    Ok(Frame::Simple("Background saving started".to_string()))
}

/// There is no append only file, the snapshot is rewritten instead.
///
/// Ref: <https://redis.io/docs/latest/commands/bgrewriteaof/>
pub fn bgrewriteaof(
    ctx: &mut Context<'_, '_>,
    _parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    ctx.store.save()?;
    Ok(Frame::Simple(
        "Background append only file rewriting started".to_string(),
    ))
}

/// Unix time in milliseconds of the last successful save, 0 when there is no snapshot.
///
/// Ref: <https://redis.io/docs/latest/commands/lastsave/>
pub fn lastsave(
    ctx: &mut Context<'_, '_>,
    _parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    Ok(Frame::Integer(ctx.store.last_save()))
}

/// Changes the database the following commands run against, including the ones queued in
/// the same transaction.
///
/// Ref: <https://redis.io/docs/latest/commands/select/>
pub fn select(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let index = parser.next_integer()?;
    ctx.db = ctx.store.db_index(index)?;

    Ok(Frame::ok())
}

/// Moves `key` from the selected database to `db`. Replies 0 when `db` already holds it.
///
/// Ref: <https://redis.io/docs/latest/commands/move/>
pub fn move_key(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let index = parser.next_integer()?;

    let to = ctx.store.db_index(index)?;
    let moved = ctx.store.move_key(ctx.db, &key, to)?;

    Ok(Frame::boolean(moved))
}

/// Ref: <https://redis.io/docs/latest/commands/flushdb/>
pub fn flushdb(ctx: &mut Context<'_, '_>, _parser: &mut CommandParser) -> Result<Frame, CommandError> {
    ctx.db().clear();
    Ok(Frame::ok())
}

/// Ref: <https://redis.io/docs/latest/commands/flushall/>
pub fn flushall(
    ctx: &mut Context<'_, '_>,
    _parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    ctx.store.flush_all();
    Ok(Frame::ok())
}

/// Ref: <https://redis.io/docs/latest/commands/info/>
pub fn info(ctx: &mut Context<'_, '_>, _parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let info = format!(
        "version:{}\r\nconnected_clients:{}\r\ndatabases:{}\r\n",
        env!("CARGO_PKG_VERSION"),
        ctx.store.connected_clients(),
        ctx.store.databases(),
    );

    Ok(Frame::Bulk(Bytes::from(info)))
}

/// `DEBUG RELOAD` saves the keyspace and replaces it with what loads back from the snapshot,
/// all without letting another connection in between. On failure the keyspace is left as it
/// was. Any other subcommand is acknowledged and ignored.
///
/// Ref: <https://redis.io/docs/latest/commands/debug/>
pub fn debug(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let subcommand = parser.next_string()?;

    if subcommand.eq_ignore_ascii_case("reload") {
        ctx.store.reload()?;
    }

    Ok(Frame::ok())
}
