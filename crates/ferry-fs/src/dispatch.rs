//! Command dispatch: one handler per verb, each writing its own success reply.
//! Errors are returned to the session, which turns them into `ERROR:` lines.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::ops::FileStore;
use crate::protocol::{self, Command, Request, Status};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info};

/// What the session does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: FileStore,
    allow_overwrite: bool,
}

impl Dispatcher {
    pub fn new(store: FileStore, allow_overwrite: bool) -> Self {
        Self { store, allow_overwrite }
    }

    pub async fn dispatch<S>(&self, request: Request, conn: &mut Connection<S>) -> Result<Flow>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        debug!(command = %request.command, args = ?request.args, "dispatching");

        if let Err(e) = request.check_arity() {
            return reject(conn, &request, e).await;
        }

        match (request.command, request.args.as_slice()) {
            (Command::List, []) => self.list(conn).await,
            (Command::Delete, [name]) => self.delete(conn, name).await,
            (Command::Rename, [old, new]) => self.rename(conn, old, new).await,
            (Command::Download, [name]) => self.download(conn, name).await,
            (Command::Upload, [name, size]) => self.upload(conn, name, size).await,
            (Command::Quit, []) => {
                info!("client requested disconnect");
                Ok(Flow::Close)
            }
            (command, _) => Err(command.arity_error()),
        }
    }

    async fn list<S>(&self, conn: &mut Connection<S>) -> Result<Flow>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let names = self.store.list().await?;
        debug!(count = names.len(), "sending listing");
        conn.write_raw(&protocol::encode_listing(&names)).await?;
        Ok(Flow::Continue)
    }

    async fn delete<S>(&self, conn: &mut Connection<S>, name: &str) -> Result<Flow>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        protocol::validate_filename(name)?;
        self.store.delete(name).await?;
        info!(name, "file deleted");
        conn.write_response(Status::Ok, &format!("File deleted: {name}")).await?;
        Ok(Flow::Continue)
    }

    async fn rename<S>(&self, conn: &mut Connection<S>, old: &str, new: &str) -> Result<Flow>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        protocol::validate_filename(old)?;
        protocol::validate_filename(new)?;
        self.store.rename(old, new).await?;
        info!(old, new, "file renamed");
        conn.write_response(Status::Ok, &format!("File renamed from {old} to {new}"))
            .await?;
        Ok(Flow::Continue)
    }

    async fn download<S>(&self, conn: &mut Connection<S>, name: &str) -> Result<Flow>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        protocol::validate_filename(name)?;
        let (mut file, size) = self.store.open_read(name).await?;

        conn.write_raw(&protocol::encode_size_line(size)).await?;

        // Past the OK line nothing can be reported in band: the peer is
        // counting payload bytes
        match conn.send_from(&mut file, size, |_| {}).await {
            Ok(_) => {
                info!(name, size, "file sent");
                Ok(Flow::Continue)
            }
            Err(e) => {
                error!(name, size, error = %e, "download aborted, closing connection");
                Ok(Flow::Close)
            }
        }
    }

    async fn upload<S>(&self, conn: &mut Connection<S>, name: &str, size: &str) -> Result<Flow>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // Without a size the payload length is unknown; nothing to drain
        let size = protocol::parse_size(size)?;

        if let Err(e) = protocol::validate_filename(name) {
            return refuse(conn, size, e).await;
        }
        if !self.allow_overwrite && self.store.exists(name).await {
            return refuse(conn, size, Error::AlreadyExists(name.to_string())).await;
        }
        let mut file = match self.store.create_write(name).await {
            Ok(file) => file,
            Err(e) => return refuse(conn, size, e).await,
        };

        debug!(name, size, "receiving file");
        if let Err(e) = conn.receive_into(&mut file, size, |_| {}).await {
            drop(file);
            self.store.discard_partial(name).await;
            return Err(e);
        }
        drop(file);

        info!(name, size, "file received");
        conn.write_response(Status::Ok, &format!("File uploaded: {name}")).await?;
        Ok(Flow::Continue)
    }
}

/// Drop a refused upload's payload so the next control line stays aligned
async fn refuse<S>(conn: &mut Connection<S>, size: u64, err: Error) -> Result<Flow>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!(size, error = %err, "upload refused, draining payload");
    conn.discard(size).await?;
    Err(err)
}

/// A malformed request. An upload that split into extra fields (a
/// filename holding the delimiter) still sends its payload, announced
/// by the last field.
async fn reject<S>(conn: &mut Connection<S>, request: &Request, err: Error) -> Result<Flow>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let announced = match (request.command, request.args.last()) {
        (Command::Upload, Some(last)) if request.args.len() > Command::Upload.arity() => {
            protocol::parse_size(last).ok()
        }
        _ => None,
    };
    match announced {
        Some(size) => refuse(conn, size, err).await,
        None => Err(err),
    }
}
