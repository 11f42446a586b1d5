use bytes::Bytes;
use itertools::Itertools;
use std::str;

use crate::commands::{CommandError, CommandParser, CommandParserError, Context};
use crate::frame::Frame;

/// Set `key` to hold the string `value`. If `key` already holds a value, it is overwritten,
/// regardless of its type. Any previous time to live associated with the key is discarded.
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
pub fn set(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let value = parser.next_bytes()?;

    ctx.db().set(key, value);

    Ok(Frame::ok())
}

/// Get the value of `key`. If the key does not exist the special value nil is returned. An
/// error is returned if the value stored at `key` is not a string.
///
/// Ref: <https://redis.io/docs/latest/commands/get/>
pub fn get(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    Ok(Frame::bulk_or_null(ctx.db().get_string(&key)?))
}

/// Atomically sets `key` to `value` and returns the old value stored at `key`.
///
/// Ref: <https://redis.io/docs/latest/commands/getset/>
pub fn getset(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let value = parser.next_bytes()?;

    Ok(Frame::bulk_or_null(ctx.db().get_set(&key, value)?))
}

/// Returns the values of all specified keys. For every key that does not hold a string value
/// or does not exist, the special value nil is returned.
///
/// Ref: <https://redis.io/docs/latest/commands/mget/>
pub fn mget(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let keys = parser.remaining_strings()?;

    let values = ctx
        .db()
        .mget(&keys)
        .into_iter()
        .map(Frame::bulk_or_null)
        .collect();

    Ok(Frame::Array(values))
}

/// Set `key` to hold string `value` if `key` does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/setnx/>
pub fn setnx(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let value = parser.next_bytes()?;

    Ok(Frame::boolean(ctx.db().set_nx(&key, value)))
}

fn pairs(parser: &mut CommandParser) -> Result<Vec<(String, Bytes)>, CommandError> {
    let args = parser.remaining();
    if args.len() % 2 != 0 {
        return Err(CommandError::WrongArity(parser.name()));
    }

    args.into_iter()
        .tuples()
        .map(|(key, value)| {
            let key = str::from_utf8(&key)
                .map_err(CommandParserError::InvalidUTF8String)?
                .to_string();
            Ok::<_, CommandError>((key, value))
        })
        .collect()
}

/// Sets the given keys to their respective values. Replaces existing values with new values.
///
/// Ref: <https://redis.io/docs/latest/commands/mset/>
pub fn mset(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let pairs = pairs(parser)?;
    ctx.db().mset(pairs);

    Ok(Frame::ok())
}

/// Sets the given keys to their respective values, but only when none of them exists.
///
/// Ref: <https://redis.io/docs/latest/commands/msetnx/>
pub fn msetnx(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let pairs = pairs(parser)?;
    Ok(Frame::boolean(ctx.db().mset_nx(pairs)))
}

/// If `key` already exists and is a string, this command appends the value at the end of the
/// string. If `key` does not exist it is created and set as an empty string first.
///
/// Ref: <https://redis.io/docs/latest/commands/append/>
pub fn append(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let value = parser.next_bytes()?;

    let len = ctx.db().append(&key, &value)?;

    Ok(Frame::Integer(len as i64))
}

fn incr_by(ctx: &mut Context<'_, '_>, key: &str, increment: i64) -> Result<Frame, CommandError> {
    Ok(Frame::Integer(ctx.db().incr_by(key, increment)?))
}

/// Increments the number stored at `key` by one. If the key does not exist, it is set to 0
/// before performing the operation.
///
/// Ref: <https://redis.io/docs/latest/commands/incr/>
pub fn incr(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    incr_by(ctx, &key, 1)
}

/// Ref: <https://redis.io/docs/latest/commands/incrby/>
pub fn incrby(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let increment = parser.next_integer()?;
    incr_by(ctx, &key, increment)
}

/// Ref: <https://redis.io/docs/latest/commands/decr/>
pub fn decr(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    incr_by(ctx, &key, -1)
}

/// Ref: <https://redis.io/docs/latest/commands/decrby/>
pub fn decrby(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let decrement = parser
        .next_integer()?
        .checked_neg()
        .ok_or(CommandError::NotAnInteger)?;
    incr_by(ctx, &key, decrement)
}
