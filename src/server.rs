use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, error, info, instrument, Level};

use crate::commands::Action;
use crate::config::Config;
use crate::connection::Connection;
use crate::session::Session;
use crate::store::Store;
use crate::Error;

/// Binds the configured address and serves until a client sends `SHUTDOWN` or the process
/// receives Ctrl-C.
pub async fn run(config: Config) -> Result<(), Error> {
    let level = if config.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;

    serve(listener, config, tokio::signal::ctrl_c()).await
}

/// Serves connections accepted on `listener` until `shutdown` completes or a client sends
/// `SHUTDOWN`. The snapshot is loaded before the first connection is accepted and saved once
/// the listener stopped.
pub async fn serve(
    listener: TcpListener,
    config: Config,
    shutdown: impl Future,
) -> Result<(), Error> {
    let store = Store::with_sweep_interval(
        config.databases,
        config.dbfilename.clone(),
        config.expire_sweep_max_idle,
    );

    if !store.lock().load()? {
        info!("No snapshot at {:?}, starting empty", store.snapshot_path());
    }

    let stop = Arc::new(Notify::new());

    info!("Tardis server listening on {}", listener.local_addr()?);

    tokio::select! {
        res = accept_loop(&listener, &store, &config, &stop) => {
            if let Err(err) = res {
                error!(cause = %err, "Failed to accept");
            }
        }
        _ = stop.notified() => {
            info!("Shutting down on client request");
        }
        _ = shutdown => {
            info!("Shutting down");
        }
    }

    store.lock().save()?;

    Ok(())
}

async fn accept_loop(
    listener: &TcpListener,
    store: &Store,
    config: &Config,
    stop: &Arc<Notify>,
) -> Result<(), Error> {
    loop {
        let (socket, client_address) = listener.accept().await?;
        let store = store.clone();
        let password = config.password.clone();
        let stop = stop.clone();

        tokio::spawn(async move {
            let clients = store.client_connected();
            info!(
                "Accepted connection from {}, {} clients connected",
                client_address, clients
            );

            let res = handle_connection(socket, client_address, &store, password, &stop).await;
            if let Err(err) = res {
                error!(cause = %err, "Connection error");
            }

            let clients = store.client_disconnected();
            info!("{} clients connected", clients);
        });
    }
}

#[instrument(
    name = "connection",
    skip(stream, store, password, stop),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    store: &Store,
    password: Option<String>,
    stop: &Notify,
) -> Result<(), Error> {
    let mut conn = Connection::new(stream);
    let mut session = Session::new(password);

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", client_address.to_string());

    while let Some(frame) = conn.read_frame().await? {
        debug!("Received frame from client: {}", frame);

        if let Some(reply) = session.handle(frame, store) {
            debug!("Sending reply to client: {}", reply);
            conn.write_frame(reply).await?;
        }

        match session.take_action() {
            Some(Action::Quit) => break,
            Some(Action::Shutdown) => {
                stop.notify_one();
                break;
            }
            None => {}
        }
    }

    info!("Connection closed");
    Ok(())
}
