//! Per-connection command loop

use crate::connection::Connection;
use crate::dispatch::{Dispatcher, Flow};
use crate::error::{Error, Result};
use crate::protocol::{self, Status};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, warn};

/// One accepted connection, from its first command to quit or EOF
pub struct Session<'a, S> {
    conn: Connection<S>,
    dispatcher: &'a Dispatcher,
}

impl<'a, S> Session<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, dispatcher: &'a Dispatcher, io_timeout: Option<Duration>) -> Self {
        Self {
            conn: Connection::new(stream, io_timeout),
            dispatcher,
        }
    }

    /// Serve commands until quit, EOF or a fatal error.
    ///
    /// Command-level errors are answered with an `ERROR:` line and the loop
    /// goes on. Fatal errors are reported once, best effort, and returned.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let line = match self.conn.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("peer closed connection");
                    return Ok(());
                }
                Err(e) => {
                    self.fail(e).await?;
                    continue;
                }
            };

            let request = match protocol::decode_request(&line) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    self.fail(e).await?;
                    continue;
                }
            };

            match self.dispatcher.dispatch(request, &mut self.conn).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Close) => {
                    if let Err(e) = self.conn.shutdown().await {
                        debug!(error = %e, "shutdown after close");
                    }
                    return Ok(());
                }
                Err(e) => self.fail(e).await?,
            }
        }
    }

    /// Answer a failed command. Returns the error itself when it is fatal.
    async fn fail(&mut self, err: Error) -> Result<()> {
        if err.is_fatal() {
            error!(error = %err, "closing connection");
            if let Err(e) = self.conn.write_response(Status::Error, &err.to_string()).await {
                debug!(error = %e, "could not report fatal error");
            }
            return Err(err);
        }

        warn!(error = %err, "command failed");
        self.conn.write_response(Status::Error, &err.to_string()).await
    }
}
