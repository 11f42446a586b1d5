use bytes::Bytes;
use strum_macros::EnumString;

use crate::commands::{CommandError, CommandParser, Context};
use crate::frame::Frame;

#[derive(Debug, PartialEq, EnumString)]
#[strum(ascii_case_insensitive)]
enum RangeOption {
    Limit,
    WithScores,
}

fn next_option(parser: &mut CommandParser) -> Result<Option<RangeOption>, CommandError> {
    match parser.next_optional_string()? {
        Some(token) => token
            .parse::<RangeOption>()
            .map(Some)
            .map_err(|_| CommandError::Syntax),
        None => Ok(None),
    }
}

fn members_reply(members: Vec<(Bytes, f64)>, with_scores: bool) -> Frame {
    let frames = if with_scores {
        members
            .into_iter()
            .flat_map(|(member, score)| [Frame::Bulk(member), Frame::double(score)])
            .collect()
    } else {
        members
            .into_iter()
            .map(|(member, _)| Frame::Bulk(member))
            .collect()
    };

    Frame::Array(frames)
}

/// Adds `member` with `score` to the sorted set stored at `key`, or updates the score when
/// it is already a member. Returns 1 when the member is new.
///
/// Ref: <https://redis.io/docs/latest/commands/zadd/>
pub fn zadd(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let score = parser.next_float()?;
    let member = parser.next_bytes()?;

    Ok(Frame::boolean(ctx.db().zadd(&key, score, member)?))
}

/// Ref: <https://redis.io/docs/latest/commands/zrem/>
pub fn zrem(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let member = parser.next_bytes()?;

    Ok(Frame::boolean(ctx.db().zrem(&key, &member)?))
}

/// Increments the score of `member` by `increment` and replies with the new score. A member
/// that is not there starts at zero.
///
/// Ref: <https://redis.io/docs/latest/commands/zincrby/>
pub fn zincrby(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let increment = parser.next_float()?;
    let member = parser.next_bytes()?;

    Ok(Frame::double(ctx.db().zincrby(&key, increment, member)?))
}

fn rank(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
    rev: bool,
) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let member = parser.next_bytes()?;

    Ok(match ctx.db().zrank(&key, &member, rev)? {
        Some(rank) => Frame::Integer(rank as i64),
        None => Frame::Null,
    })
}

/// Ref: <https://redis.io/docs/latest/commands/zrank/>
pub fn zrank(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    rank(ctx, parser, false)
}

/// Ref: <https://redis.io/docs/latest/commands/zrevrank/>
pub fn zrevrank(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    rank(ctx, parser, true)
}

fn range(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
    rev: bool,
) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let start = parser.next_integer()?;
    let stop = parser.next_integer()?;
    let with_scores = match next_option(parser)? {
        Some(RangeOption::WithScores) => true,
        Some(RangeOption::Limit) => return Err(CommandError::Syntax),
        None => false,
    };

    if !parser.remaining().is_empty() {
        return Err(CommandError::Syntax);
    }

    let members = ctx.db().zrange(&key, start, stop, rev)?;

    Ok(members_reply(members, with_scores))
}

/// Returns the members between ranks `start` and `stop`, lowest score first. With
/// `WITHSCORES` every member is followed by its score.
///
/// Ref: <https://redis.io/docs/latest/commands/zrange/>
pub fn zrange(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    range(ctx, parser, false)
}

/// Like `ZRANGE`, highest score first.
///
/// Ref: <https://redis.io/docs/latest/commands/zrevrange/>
pub fn zrevrange(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    range(ctx, parser, true)
}

/// Returns the members whose score lies between `min` and `max`, lowest first. Accepts
/// `LIMIT offset count` and `WITHSCORES`, in any order.
///
/// Ref: <https://redis.io/docs/latest/commands/zrangebyscore/>
pub fn zrangebyscore(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let min = parser.next_score_bound()?;
    let max = parser.next_score_bound()?;

    let mut with_scores = false;
    let mut limit = None;

    while let Some(option) = next_option(parser)? {
        match option {
            RangeOption::WithScores => with_scores = true,
            RangeOption::Limit => {
                let offset = parser.next_integer()?;
                let count = parser.next_integer()?;
                limit = Some((offset, count));
            }
        }
    }

    let members = match limit {
        Some((offset, _)) if offset < 0 => vec![],
        Some((offset, count)) => {
            let count = usize::try_from(count).ok();
            ctx.db()
                .zrange_by_score(&key, &min, &max, offset as usize, count)?
        }
        None => ctx.db().zrange_by_score(&key, &min, &max, 0, None)?,
    };

    Ok(members_reply(members, with_scores))
}

/// Ref: <https://redis.io/docs/latest/commands/zremrangebyrank/>
pub fn zremrangebyrank(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let start = parser.next_integer()?;
    let stop = parser.next_integer()?;

    let removed = ctx.db().zrem_range_by_rank(&key, start, stop)?;

    Ok(Frame::Integer(removed as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/zremrangebyscore/>
pub fn zremrangebyscore(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let min = parser.next_score_bound()?;
    let max = parser.next_score_bound()?;

    let removed = ctx.db().zrem_range_by_score(&key, &min, &max)?;

    Ok(Frame::Integer(removed as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/zcard/>
pub fn zcard(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    Ok(Frame::Integer(ctx.db().zcard(&key)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/zscore/>
pub fn zscore(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let member = parser.next_bytes()?;

    Ok(ctx
        .db()
        .zscore(&key, &member)?
        .map_or(Frame::Null, Frame::double))
}

/// Ref: <https://redis.io/docs/latest/commands/zcount/>
pub fn zcount(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let min = parser.next_score_bound()?;
    let max = parser.next_score_bound()?;

    Ok(Frame::Integer(ctx.db().zcount(&key, &min, &max)? as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{bulk, run};
    use crate::store::Store;

    fn error(message: &str) -> Frame {
        Frame::Error(format!("ERR {}", message))
    }

    fn store_with_scores() -> Store {
        let store = Store::new(1, "unused.db");
        for (score, member) in [("1", "a"), ("2", "b"), ("3", "c"), ("4", "d")] {
            run(&store, 0, &["ZADD", "z", score, member]);
        }
        store
    }

    #[tokio::test]
    async fn zadd_and_zscore() {
        let store = Store::new(1, "unused.db");

        assert_eq!(run(&store, 0, &["ZADD", "z", "1.5", "a"]), Frame::Integer(1));
        assert_eq!(run(&store, 0, &["ZADD", "z", "2", "a"]), Frame::Integer(0));
        assert_eq!(run(&store, 0, &["ZSCORE", "z", "a"]), bulk("2"));
        assert_eq!(run(&store, 0, &["ZSCORE", "z", "b"]), Frame::Null);
        assert_eq!(run(&store, 0, &["ZCARD", "z"]), Frame::Integer(1));

        assert_eq!(
            run(&store, 0, &["ZADD", "z", "high", "a"]),
            error("value is not a valid float")
        );
    }

    #[tokio::test]
    async fn zincrby() {
        let store = Store::new(1, "unused.db");

        assert_eq!(run(&store, 0, &["ZINCRBY", "z", "2.5", "a"]), bulk("2.5"));
        assert_eq!(run(&store, 0, &["ZINCRBY", "z", "-1", "a"]), bulk("1.5"));

        run(&store, 0, &["ZADD", "z", "inf", "b"]);
        assert_eq!(
            run(&store, 0, &["ZINCRBY", "z", "-inf", "b"]),
            error("resulting score is not a number (NaN)")
        );
        assert_eq!(run(&store, 0, &["ZSCORE", "z", "b"]), bulk("inf"));
    }

    #[tokio::test]
    async fn ranks() {
        let store = store_with_scores();

        assert_eq!(run(&store, 0, &["ZRANK", "z", "a"]), Frame::Integer(0));
        assert_eq!(run(&store, 0, &["ZREVRANK", "z", "a"]), Frame::Integer(3));
        assert_eq!(run(&store, 0, &["ZRANK", "z", "x"]), Frame::Null);
    }

    #[tokio::test]
    async fn ranges() {
        let store = store_with_scores();

        assert_eq!(
            run(&store, 0, &["ZRANGE", "z", "0", "1"]),
            Frame::Array(vec![bulk("a"), bulk("b")])
        );
        assert_eq!(
            run(&store, 0, &["ZREVRANGE", "z", "0", "1", "WITHSCORES"]),
            Frame::Array(vec![bulk("d"), bulk("4"), bulk("c"), bulk("3")])
        );
        assert_eq!(
            run(&store, 0, &["ZRANGE", "z", "0", "1", "BOGUS"]),
            error("syntax error")
        );
        assert_eq!(
            run(&store, 0, &["ZRANGE", "z", "0", "1", "WITHSCORES", "again"]),
            error("syntax error")
        );
    }

    #[tokio::test]
    async fn range_by_score() {
        let store = store_with_scores();

        assert_eq!(
            run(&store, 0, &["ZRANGEBYSCORE", "z", "2", "3"]),
            Frame::Array(vec![bulk("b"), bulk("c")])
        );
        assert_eq!(
            run(&store, 0, &["ZRANGEBYSCORE", "z", "(1", "+inf", "LIMIT", "1", "2"]),
            Frame::Array(vec![bulk("c"), bulk("d")])
        );
        assert_eq!(
            run(&store, 0, &["ZRANGEBYSCORE", "z", "-inf", "1", "WITHSCORES"]),
            Frame::Array(vec![bulk("a"), bulk("1")])
        );
        assert_eq!(
            run(&store, 0, &["ZRANGEBYSCORE", "z", "-inf", "+inf", "LIMIT", "2", "-1"]),
            Frame::Array(vec![bulk("c"), bulk("d")])
        );
        assert_eq!(
            run(&store, 0, &["ZRANGEBYSCORE", "z", "-inf", "+inf", "LIMIT", "-1", "2"]),
            Frame::Array(vec![])
        );
        assert_eq!(
            run(&store, 0, &["ZRANGEBYSCORE", "z", "-inf", "+inf", "LIMIT", "1"]),
            error("syntax error")
        );
        assert_eq!(
            run(&store, 0, &["ZRANGEBYSCORE", "z", "low", "+inf"]),
            error("value is not a valid float")
        );
    }

    #[tokio::test]
    async fn count_and_removals() {
        let store = store_with_scores();

        assert_eq!(run(&store, 0, &["ZCOUNT", "z", "2", "4"]), Frame::Integer(3));
        assert_eq!(
            run(&store, 0, &["ZREMRANGEBYSCORE", "z", "-inf", "(2"]),
            Frame::Integer(1)
        );
        assert_eq!(
            run(&store, 0, &["ZREMRANGEBYRANK", "z", "-1", "-1"]),
            Frame::Integer(1)
        );
        assert_eq!(
            run(&store, 0, &["ZRANGE", "z", "0", "-1"]),
            Frame::Array(vec![bulk("b"), bulk("c")])
        );
        assert_eq!(run(&store, 0, &["ZREM", "z", "b"]), Frame::Integer(1));
        assert_eq!(run(&store, 0, &["ZREM", "z", "b"]), Frame::Integer(0));
    }
}
