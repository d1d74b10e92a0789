//! ferry-fs: remote file management over a single TCP connection
//!
//! Serves list/delete/rename/download/upload against one managed directory.
//! Wire format: newline-terminated UTF-8 control lines, with raw payloads
//! of an announced length following `OK <size>` and `upload <name> <size>`.

pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod ops;
pub mod protocol;
pub mod session;
pub mod transfer;

pub use client::Client;
pub use config::ServerConfig;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use ops::FileStore;
pub use session::Session;

use tokio::net::TcpListener;
use tracing::{error, info};

/// Bind to `config.bind` and serve forever
pub async fn run(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(&config.bind).await.map_err(Error::Transport)?;
    serve(listener, config).await
}

/// Serve connections from `listener` one at a time.
///
/// Each client gets the whole server until it quits or disconnects; the next
/// connection waits in the accept backlog.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> Result<()> {
    let addr = listener.local_addr().map_err(Error::Transport)?;
    info!(%addr, root = %config.root.display(), "ferry-fs listening");

    let dispatcher = Dispatcher::new(FileStore::new(&config.root), config.allow_overwrite);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!(%peer, "client connected");
                let session = Session::new(stream, &dispatcher, config.io_timeout);
                if let Err(e) = session.run().await {
                    error!(%peer, error = %e, "session ended with error");
                }
                info!(%peer, "client disconnected");
            }
            Err(e) => {
                error!(error = %e, "accept error");
            }
        }
    }
}
