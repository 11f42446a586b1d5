use crate::commands::{CommandError, CommandParser, Context};
use crate::frame::Frame;
use crate::store::End;

fn push(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
    end: End,
) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let value = parser.next_bytes()?;

    let len = ctx.db().push(&key, value, end)?;

    Ok(Frame::Integer(len as i64))
}

/// Appends `value` to the list stored at `key`, creating it when missing. Returns the length
/// of the list after the push.
///
/// Ref: <https://redis.io/docs/latest/commands/rpush/>
pub fn rpush(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    push(ctx, parser, End::Tail)
}

/// Prepends `value` to the list stored at `key`.
///
/// Ref: <https://redis.io/docs/latest/commands/lpush/>
pub fn lpush(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    push(ctx, parser, End::Head)
}

/// Ref: <https://redis.io/docs/latest/commands/llen/>
pub fn llen(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    Ok(Frame::Integer(ctx.db().llen(&key)? as i64))
}

/// Returns the elements between `start` and `stop`, both inclusive. Negative offsets count
/// from the end of the list, `-1` being the last element. Out of range offsets are clamped.
///
/// Ref: <https://redis.io/docs/latest/commands/lrange/>
pub fn lrange(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let start = parser.next_integer()?;
    let stop = parser.next_integer()?;

    Ok(Frame::bulk_array(ctx.db().lrange(&key, start, stop)?))
}

/// Trims the list so it only contains the elements between `start` and `stop`.
///
/// Ref: <https://redis.io/docs/latest/commands/ltrim/>
pub fn ltrim(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let start = parser.next_integer()?;
    let stop = parser.next_integer()?;

    ctx.db().ltrim(&key, start, stop)?;

    Ok(Frame::ok())
}

/// Ref: <https://redis.io/docs/latest/commands/lindex/>
pub fn lindex(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let index = parser.next_integer()?;

    Ok(Frame::bulk_or_null(ctx.db().lindex(&key, index)?))
}

/// Ref: <https://redis.io/docs/latest/commands/lset/>
pub fn lset(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let index = parser.next_integer()?;
    let value = parser.next_bytes()?;

    ctx.db().lset(&key, index, value)?;

    Ok(Frame::ok())
}

/// Removes occurrences of `value`: the first `count` ones from the head when `count` is
/// positive, from the tail when negative, every one of them when zero.
///
/// Ref: <https://redis.io/docs/latest/commands/lrem/>
pub fn lrem(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let count = parser.next_integer()?;
    let value = parser.next_bytes()?;

    let removed = ctx.db().lrem(&key, count, &value)?;

    Ok(Frame::Integer(removed as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/lpop/>
pub fn lpop(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    Ok(Frame::bulk_or_null(ctx.db().pop(&key, End::Head)?))
}

/// Ref: <https://redis.io/docs/latest/commands/rpop/>
pub fn rpop(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    Ok(Frame::bulk_or_null(ctx.db().pop(&key, End::Tail)?))
}

/// Atomically removes the last element of `source` and pushes it at the head of
/// `destination`. When both are the same list this rotates it.
///
/// Ref: <https://redis.io/docs/latest/commands/rpoplpush/>
pub fn rpoplpush(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    let source = parser.next_string()?;
    let destination = parser.next_string()?;

    Ok(Frame::bulk_or_null(
        ctx.db().rpoplpush(&source, &destination)?,
    ))
}
