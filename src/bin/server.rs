use clap::Parser;
use std::path::PathBuf;

use tardis::config::{self, Config};
use tardis::{server, Error};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// The port to listen on
    #[arg(short, long, env = "TARDIS_PORT", default_value_t = config::PORT)]
    port: u16,

    /// The address to bind to
    #[arg(long, env = "TARDIS_BIND", default_value = "127.0.0.1")]
    bind: String,

    /// Log every request and reply
    #[arg(long, env = "TARDIS_DEBUG")]
    debug: bool,

    /// Require clients to AUTH with this password
    #[arg(long, env = "TARDIS_PASSWORD")]
    password: Option<String>,

    /// Snapshot file loaded at startup and written by SAVE
    #[arg(long, env = "TARDIS_DBFILENAME", default_value = config::DB_FILENAME)]
    dbfilename: PathBuf,

    /// Number of databases
    #[arg(long, env = "TARDIS_DATABASES", default_value_t = config::DATABASES)]
    databases: usize,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            bind: args.bind,
            port: args.port,
            debug: args.debug,
            password: args.password,
            dbfilename: args.dbfilename,
            databases: args.databases,
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    server::run(args.into()).await
}
