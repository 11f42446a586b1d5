use std::fmt;

use crate::commands::{keys, lists, server, sets, sort, strings, zsets};
use crate::commands::{CommandError, CommandParser, Context};
use crate::frame::Frame;

/// Runs one command against the keyspace.
pub type Handler = fn(&mut Context<'_, '_>, &mut CommandParser) -> Result<Frame, CommandError>;

/// How many arguments a command takes, not counting its name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arity {
    Fixed(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, args: usize) -> bool {
        match *self {
            Arity::Fixed(n) => args == n,
            Arity::AtLeast(n) => args >= n,
        }
    }
}

/// Where a command is carried out. Everything but the transaction and authentication
/// commands runs against the store; those four only touch connection state.
#[derive(Clone, Copy)]
pub enum Dispatch {
    Store(Handler),
    Auth,
    Multi,
    Exec,
    Discard,
}

pub struct CommandSpec {
    pub name: &'static str,
    pub arity: Arity,
    pub dispatch: Dispatch,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

// Names are unique in the table.
impl PartialEq for CommandSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

const fn store(name: &'static str, arity: Arity, handler: Handler) -> CommandSpec {
    CommandSpec {
        name,
        arity,
        dispatch: Dispatch::Store(handler),
    }
}

const fn session(name: &'static str, arity: Arity, dispatch: Dispatch) -> CommandSpec {
    CommandSpec {
        name,
        arity,
        dispatch,
    }
}

use Arity::{AtLeast, Fixed};

static COMMANDS: &[CommandSpec] = &[
    // Connection and server
    store("ping", Fixed(0), server::ping),
    store("quit", Fixed(0), server::quit),
    store("shutdown", Fixed(0), server::shutdown),
    store("save", Fixed(0), server::save),
    store("bgsave", Fixed(0), server::bgsave),
    store("bgrewriteaof", Fixed(0), server::bgrewriteaof),
    store("lastsave", Fixed(0), server::lastsave),
    session("auth", Fixed(1), Dispatch::Auth),
    store("select", Fixed(1), server::select),
    store("move", Fixed(2), server::move_key),
    store("flushdb", Fixed(0), server::flushdb),
    store("flushall", Fixed(0), server::flushall),
    store("info", Fixed(0), server::info),
    store("debug", Fixed(1), server::debug),
    session("multi", Fixed(0), Dispatch::Multi),
    session("exec", Fixed(0), Dispatch::Exec),
    session("discard", Fixed(0), Dispatch::Discard),
    // Strings
    store("set", Fixed(2), strings::set),
    store("get", Fixed(1), strings::get),
    store("getset", Fixed(2), strings::getset),
    store("mget", AtLeast(1), strings::mget),
    store("setnx", Fixed(2), strings::setnx),
    store("mset", AtLeast(2), strings::mset),
    store("msetnx", AtLeast(2), strings::msetnx),
    store("append", Fixed(2), strings::append),
    store("incr", Fixed(1), strings::incr),
    store("incrby", Fixed(2), strings::incrby),
    store("decr", Fixed(1), strings::decr),
    store("decrby", Fixed(2), strings::decrby),
    // Keyspace
    store("exists", Fixed(1), keys::exists),
    store("del", AtLeast(1), keys::del),
    store("type", Fixed(1), keys::type_),
    store("keys", Fixed(1), keys::keys),
    store("randomkey", Fixed(0), keys::randomkey),
    store("rename", Fixed(2), keys::rename),
    store("renamenx", Fixed(2), keys::renamenx),
    store("dbsize", Fixed(0), keys::dbsize),
    store("expire", Fixed(2), keys::expire),
    store("expireat", Fixed(2), keys::expireat),
    store("ttl", Fixed(1), keys::ttl),
    store("pttl", Fixed(1), keys::pttl),
    store("persist", Fixed(1), keys::persist),
    // Lists
    store("rpush", Fixed(2), lists::rpush),
    store("lpush", Fixed(2), lists::lpush),
    store("llen", Fixed(1), lists::llen),
    store("lrange", Fixed(3), lists::lrange),
    store("ltrim", Fixed(3), lists::ltrim),
    store("lindex", Fixed(2), lists::lindex),
    store("lset", Fixed(3), lists::lset),
    store("lrem", Fixed(3), lists::lrem),
    store("lpop", Fixed(1), lists::lpop),
    store("rpop", Fixed(1), lists::rpop),
    store("rpoplpush", Fixed(2), lists::rpoplpush),
    // Sets
    store("sadd", Fixed(2), sets::sadd),
    store("srem", Fixed(2), sets::srem),
    store("spop", Fixed(1), sets::spop),
    store("smove", Fixed(3), sets::smove),
    store("scard", Fixed(1), sets::scard),
    store("sismember", Fixed(2), sets::sismember),
    store("smembers", Fixed(1), sets::smembers),
    store("srandmember", Fixed(1), sets::srandmember),
    store("sinter", AtLeast(1), sets::sinter),
    store("sinterstore", AtLeast(2), sets::sinterstore),
    store("sunion", AtLeast(1), sets::sunion),
    store("sunionstore", AtLeast(2), sets::sunionstore),
    store("sdiff", AtLeast(1), sets::sdiff),
    store("sdiffstore", AtLeast(2), sets::sdiffstore),
    // Sorted sets
    store("zadd", Fixed(3), zsets::zadd),
    store("zrem", Fixed(2), zsets::zrem),
    store("zincrby", Fixed(3), zsets::zincrby),
    store("zrank", Fixed(2), zsets::zrank),
    store("zrevrank", Fixed(2), zsets::zrevrank),
    store("zrange", AtLeast(3), zsets::zrange),
    store("zrevrange", AtLeast(3), zsets::zrevrange),
    store("zrangebyscore", AtLeast(3), zsets::zrangebyscore),
    store("zremrangebyrank", Fixed(3), zsets::zremrangebyrank),
    store("zremrangebyscore", Fixed(3), zsets::zremrangebyscore),
    store("zcard", Fixed(1), zsets::zcard),
    store("zscore", Fixed(2), zsets::zscore),
    store("zcount", Fixed(3), zsets::zcount),
    // Sorting
    store("sort", AtLeast(1), sort::sort),
];

/// Looks up a command by name, ignoring case.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
}

/// Every command the server knows.
pub fn commands() -> impl Iterator<Item = &'static CommandSpec> {
    COMMANDS.iter()
}
