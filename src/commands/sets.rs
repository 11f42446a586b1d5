use crate::commands::{CommandError, CommandParser, Context};
use crate::frame::Frame;
use crate::store::SetOp;

/// Adds `member` to the set stored at `key`, creating the set when missing. Returns 1 when
/// the member was added, 0 when it was already there.
///
/// Ref: <https://redis.io/docs/latest/commands/sadd/>
pub fn sadd(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let member = parser.next_bytes()?;

    Ok(Frame::boolean(ctx.db().sadd(&key, member)?))
}

/// Ref: <https://redis.io/docs/latest/commands/srem/>
pub fn srem(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let member = parser.next_bytes()?;

    Ok(Frame::boolean(ctx.db().srem(&key, &member)?))
}

/// Removes and returns a random member.
///
/// Ref: <https://redis.io/docs/latest/commands/spop/>
pub fn spop(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    Ok(Frame::bulk_or_null(ctx.db().spop(&key)?))
}

/// Ref: <https://redis.io/docs/latest/commands/smove/>
pub fn smove(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let source = parser.next_string()?;
    let destination = parser.next_string()?;
    let member = parser.next_bytes()?;

    Ok(Frame::boolean(
        ctx.db().smove(&source, &destination, member)?,
    ))
}

/// Ref: <https://redis.io/docs/latest/commands/scard/>
pub fn scard(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    Ok(Frame::Integer(ctx.db().scard(&key)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/sismember/>
pub fn sismember(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let member = parser.next_bytes()?;

    Ok(Frame::boolean(ctx.db().sismember(&key, &member)?))
}

/// Ref: <https://redis.io/docs/latest/commands/smembers/>
pub fn smembers(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    Ok(Frame::bulk_array(ctx.db().smembers(&key)?))
}

/// Returns a random member without removing it.
///
/// Ref: <https://redis.io/docs/latest/commands/srandmember/>
pub fn srandmember(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    Ok(Frame::bulk_or_null(ctx.db().srandmember(&key)?))
}

// Missing keys, and keys holding anything but a set, take part as empty sets.
fn combine(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
    op: SetOp,
) -> Result<Frame, CommandError> {
    let keys = parser.remaining_strings()?;
    Ok(Frame::bulk_array(ctx.db().set_op(&keys, op)))
}

fn combine_and_store(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
    op: SetOp,
) -> Result<Frame, CommandError> {
    let destination = parser.next_string()?;
    let keys = parser.remaining_strings()?;

    let len = ctx.db().set_op_store(&destination, &keys, op);

    Ok(Frame::Integer(len as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/sinter/>
pub fn sinter(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    combine(ctx, parser, SetOp::Inter)
}

/// Like `SINTER`, but stores the result in `destination`, replacing whatever was there.
/// Returns the size of the result.
///
/// Ref: <https://redis.io/docs/latest/commands/sinterstore/>
pub fn sinterstore(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    combine_and_store(ctx, parser, SetOp::Inter)
}

/// Ref: <https://redis.io/docs/latest/commands/sunion/>
pub fn sunion(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    combine(ctx, parser, SetOp::Union)
}

/// Ref: <https://redis.io/docs/latest/commands/sunionstore/>
pub fn sunionstore(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    combine_and_store(ctx, parser, SetOp::Union)
}

/// Members of the first set that are in none of the others.
///
/// Ref: <https://redis.io/docs/latest/commands/sdiff/>
pub fn sdiff(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    combine(ctx, parser, SetOp::Diff)
}

/// Ref: <https://redis.io/docs/latest/commands/sdiffstore/>
pub fn sdiffstore(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    combine_and_store(ctx, parser, SetOp::Diff)
}
