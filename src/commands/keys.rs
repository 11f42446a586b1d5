use bytes::Bytes;

use crate::commands::{CommandError, CommandParser, Context};
use crate::frame::Frame;
use crate::store::now_millis;

/// Returns whether `key` exists.
///
/// Ref: <https://redis.io/docs/latest/commands/exists/>
pub fn exists(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    Ok(Frame::boolean(ctx.db().contains(&key)))
}

/// Removes the given keys. Returns how many of them existed.
///
/// Ref: <https://redis.io/docs/latest/commands/del/>
pub fn del(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let keys = parser.remaining_strings()?;
    let db = ctx.db();

    let removed = keys.iter().filter(|key| db.remove(key).is_some()).count();

    Ok(Frame::Integer(removed as i64))
}

/// Returns the type of the value stored at `key`: `string`, `list`, `set`, `zset`, or `none`
/// when the key does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/type/>
pub fn type_(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let name = ctx.db().value(&key).map_or("none", |value| value.type_name());

    Ok(Frame::Simple(name.to_string()))
}

/// Returns all keys matching a glob-style pattern.
///
/// Ref: <https://redis.io/docs/latest/commands/keys/>
pub fn keys(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let pattern = parser.next_string()?;
    let keys = ctx.db().keys(&pattern);

    Ok(Frame::bulk_array(keys.into_iter().map(Bytes::from)))
}

/// Ref: <https://redis.io/docs/latest/commands/randomkey/>
pub fn randomkey(
    ctx: &mut Context<'_, '_>,
    _parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    Ok(Frame::bulk_or_null(ctx.db().random_key().map(Bytes::from)))
}

/// Ref: <https://redis.io/docs/latest/commands/rename/>
pub fn rename(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let from = parser.next_string()?;
    let to = parser.next_string()?;

    ctx.db().rename(&from, &to)?;

    Ok(Frame::ok())
}

/// Ref: <https://redis.io/docs/latest/commands/renamenx/>
pub fn renamenx(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    let from = parser.next_string()?;
    let to = parser.next_string()?;

    Ok(Frame::boolean(ctx.db().rename_nx(&from, &to)?))
}

/// Ref: <https://redis.io/docs/latest/commands/dbsize/>
pub fn dbsize(ctx: &mut Context<'_, '_>, _parser: &mut CommandParser) -> Result<Frame, CommandError> {
    Ok(Frame::Integer(ctx.db().len() as i64))
}

/// Sets a timeout of `seconds` on `key`. A timeout in the past deletes the key.
///
/// Ref: <https://redis.io/docs/latest/commands/expire/>
pub fn expire(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let seconds = parser.next_integer()?;

    let at = seconds
        .checked_mul(1000)
        .map(|millis| (now_millis() as i64).saturating_add(millis).max(0) as u64)
        .ok_or(CommandError::NotAnInteger)?;

    Ok(Frame::boolean(ctx.store.expire_at(ctx.db, &key, Some(at))))
}

/// Like `EXPIRE`, but takes an absolute unix time in seconds.
///
/// Ref: <https://redis.io/docs/latest/commands/expireat/>
pub fn expireat(
    ctx: &mut Context<'_, '_>,
    parser: &mut CommandParser,
) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    let timestamp = parser.next_integer()?;

    let at = timestamp
        .checked_mul(1000)
        .ok_or(CommandError::NotAnInteger)?
        .max(0) as u64;

    Ok(Frame::boolean(ctx.store.expire_at(ctx.db, &key, Some(at))))
}

/// Returns the remaining time to live of `key` in seconds, `-1` when it has no timeout and
/// `-2` when it does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/ttl/>
pub fn ttl(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;

    let ttl = match ctx.db().ttl(&key) {
        millis if millis >= 0 => (millis + 499) / 1000,
        missing_or_persistent => missing_or_persistent,
    };

    Ok(Frame::Integer(ttl))
}

/// Like `TTL`, in milliseconds.
///
/// Ref: <https://redis.io/docs/latest/commands/pttl/>
pub fn pttl(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;
    Ok(Frame::Integer(ctx.db().ttl(&key)))
}

/// Removes the timeout of `key`. Returns whether there was one.
///
/// Ref: <https://redis.io/docs/latest/commands/persist/>
pub fn persist(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;

    let had_timeout = ctx.db().ttl(&key) >= 0;
    if had_timeout {
        ctx.store.expire_at(ctx.db, &key, None);
    }

    Ok(Frame::boolean(had_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{bulk, run};
    use crate::store::Store;

    #[tokio::test]
    async fn exists_and_del() {
        let store = Store::new(1, "unused.db");

        run(&store, 0, &["SET", "a", "1"]);
        run(&store, 0, &["SET", "b", "2"]);

        assert_eq!(run(&store, 0, &["EXISTS", "a"]), Frame::Integer(1));
        assert_eq!(run(&store, 0, &["DEL", "a", "b", "c"]), Frame::Integer(2));
        assert_eq!(run(&store, 0, &["EXISTS", "a"]), Frame::Integer(0));
    }

    #[tokio::test]
    async fn type_of_each_value() {
        let store = Store::new(1, "unused.db");

        run(&store, 0, &["SET", "s", "v"]);
        run(&store, 0, &["RPUSH", "l", "v"]);
        run(&store, 0, &["SADD", "set", "v"]);
        run(&store, 0, &["ZADD", "z", "1", "v"]);

        for (key, expected) in [
            ("s", "string"),
            ("l", "list"),
            ("set", "set"),
            ("z", "zset"),
            ("missing", "none"),
        ] {
            assert_eq!(
                run(&store, 0, &["TYPE", key]),
                Frame::Simple(expected.to_string())
            );
        }
    }

    #[tokio::test]
    async fn keys_by_pattern() {
        let store = Store::new(1, "unused.db");

        for key in ["foo", "foobar", "bar"] {
            run(&store, 0, &["SET", key, "v"]);
        }

        assert_eq!(
            run(&store, 0, &["KEYS", "foo*"]),
            Frame::Array(vec![bulk("foo"), bulk("foobar")])
        );
        assert_eq!(run(&store, 0, &["KEYS", "nothing*"]), Frame::Array(vec![]));
    }

    #[tokio::test]
    async fn randomkey_on_empty_database() {
        let store = Store::new(1, "unused.db");

        assert_eq!(run(&store, 0, &["RANDOMKEY"]), Frame::Null);

        run(&store, 0, &["SET", "only", "v"]);
        assert_eq!(run(&store, 0, &["RANDOMKEY"]), bulk("only"));
    }

    #[tokio::test]
    async fn rename_and_renamenx() {
        let store = Store::new(1, "unused.db");

        assert_eq!(
            run(&store, 0, &["RENAME", "a", "b"]),
            Frame::Error("ERR no such key".to_string())
        );

        run(&store, 0, &["SET", "a", "1"]);
        run(&store, 0, &["SET", "c", "3"]);

        assert_eq!(run(&store, 0, &["RENAME", "a", "b"]), Frame::ok());
        assert_eq!(run(&store, 0, &["GET", "b"]), bulk("1"));
        assert_eq!(run(&store, 0, &["RENAMENX", "b", "c"]), Frame::Integer(0));
        assert_eq!(run(&store, 0, &["RENAMENX", "b", "d"]), Frame::Integer(1));
        assert_eq!(run(&store, 0, &["GET", "d"]), bulk("1"));
    }

    #[tokio::test]
    async fn dbsize_counts_selected_database() {
        let store = Store::new(2, "unused.db");

        run(&store, 0, &["SET", "a", "1"]);
        run(&store, 0, &["SET", "b", "1"]);
        run(&store, 1, &["SET", "c", "1"]);

        assert_eq!(run(&store, 0, &["DBSIZE"]), Frame::Integer(2));
        assert_eq!(run(&store, 1, &["DBSIZE"]), Frame::Integer(1));
    }

    #[tokio::test]
    async fn expire_ttl_and_persist() {
        let store = Store::new(1, "unused.db");

        assert_eq!(run(&store, 0, &["EXPIRE", "k", "10"]), Frame::Integer(0));
        assert_eq!(run(&store, 0, &["TTL", "k"]), Frame::Integer(-2));

        run(&store, 0, &["SET", "k", "v"]);
        assert_eq!(run(&store, 0, &["TTL", "k"]), Frame::Integer(-1));

        assert_eq!(run(&store, 0, &["EXPIRE", "k", "10"]), Frame::Integer(1));
        assert_eq!(run(&store, 0, &["TTL", "k"]), Frame::Integer(10));

        let Frame::Integer(pttl) = run(&store, 0, &["PTTL", "k"]) else {
            panic!("PTTL must reply with an integer");
        };
        assert!(pttl > 9_000 && pttl <= 10_000);

        assert_eq!(run(&store, 0, &["PERSIST", "k"]), Frame::Integer(1));
        assert_eq!(run(&store, 0, &["PERSIST", "k"]), Frame::Integer(0));
        assert_eq!(run(&store, 0, &["TTL", "k"]), Frame::Integer(-1));
    }

    #[tokio::test]
    async fn expire_in_the_past_deletes() {
        let store = Store::new(1, "unused.db");
        run(&store, 0, &["SET", "a", "v"]);
        run(&store, 0, &["SET", "b", "v"]);

        assert_eq!(run(&store, 0, &["EXPIRE", "a", "-1"]), Frame::Integer(1));
        assert_eq!(run(&store, 0, &["EXPIREAT", "b", "1"]), Frame::Integer(1));

        assert_eq!(run(&store, 0, &["EXISTS", "a"]), Frame::Integer(0));
        assert_eq!(run(&store, 0, &["GET", "b"]), Frame::Null);
    }

    #[tokio::test]
    async fn expireat_in_the_future() {
        let store = Store::new(1, "unused.db");
        run(&store, 0, &["SET", "k", "v"]);

        let at = (now_millis() / 1000 + 100).to_string();
        assert_eq!(run(&store, 0, &["EXPIREAT", "k", &at]), Frame::Integer(1));

        let Frame::Integer(ttl) = run(&store, 0, &["TTL", "k"]) else {
            panic!("TTL must reply with an integer");
        };
        assert!(ttl > 98 && ttl <= 100);
    }

    #[tokio::test]
    async fn expire_rejects_non_integers() {
        let store = Store::new(1, "unused.db");
        run(&store, 0, &["SET", "k", "v"]);

        assert_eq!(
            run(&store, 0, &["EXPIRE", "k", "soon"]),
            Frame::Error("ERR value is not an integer or out of range".to_string())
        );
    }
}
