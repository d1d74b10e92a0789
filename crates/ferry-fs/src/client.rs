//! Client side of the protocol
//!
//! Uses the same codec and the same single-cursor [`Connection`] as the
//! server, so a download payload is read from the buffer that held the
//! `OK <size>` line.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::protocol::{self, Command, Status};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

pub struct Client<S> {
    conn: Connection<S>,
}

impl Client<TcpStream> {
    pub async fn connect<A: ToSocketAddrs>(addr: A, io_timeout: Option<Duration>) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.map_err(Error::Transport)?;
        Ok(Self::new(stream, io_timeout))
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, io_timeout: Option<Duration>) -> Self {
        Self {
            conn: Connection::new(stream, io_timeout),
        }
    }

    async fn send(&mut self, command: Command, args: &[&str]) -> Result<()> {
        debug!(%command, ?args, "sending request");
        let line = protocol::encode_request(command, args)?;
        self.conn.write_raw(&line).await
    }

    async fn next_line(&mut self) -> Result<String> {
        self.conn
            .read_line()
            .await?
            .ok_or_else(|| Error::Transport(io::ErrorKind::UnexpectedEof.into()))
    }

    /// Read a status line; `ERROR` becomes [`Error::Remote`]
    async fn expect_ok(&mut self) -> Result<String> {
        let line = self.next_line().await?;
        match protocol::decode_response_line(&line)? {
            (Status::Ok, rest) => Ok(rest.to_string()),
            (Status::Error, msg) => Err(Error::Remote(msg.to_string())),
        }
    }

    pub async fn list(&mut self) -> Result<Vec<String>> {
        self.send(Command::List, &[]).await?;

        let line = self.next_line().await?;
        if line.starts_with(protocol::STATUS_ERROR) {
            let (_, msg) = protocol::decode_response_line(&line)?;
            return Err(Error::Remote(msg.to_string()));
        }

        let count = protocol::parse_count(&line)?;
        let mut names = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            names.push(self.next_line().await?);
        }
        Ok(names)
    }

    /// Returns the server's confirmation message
    pub async fn delete(&mut self, name: &str) -> Result<String> {
        protocol::validate_filename(name)?;
        self.send(Command::Delete, &[name]).await?;
        self.expect_ok().await
    }

    pub async fn rename(&mut self, old: &str, new: &str) -> Result<String> {
        protocol::validate_filename(old)?;
        protocol::validate_filename(new)?;
        self.send(Command::Rename, &[old, new]).await?;
        self.expect_ok().await
    }

    /// Stream `name` into `sink`. `progress` gets `(received, total)`.
    pub async fn download<W, P>(&mut self, name: &str, sink: &mut W, mut progress: P) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
        P: FnMut(u64, u64),
    {
        protocol::validate_filename(name)?;
        self.send(Command::Download, &[name]).await?;

        let announced = self.expect_ok().await?;
        let size = protocol::parse_size(&announced)
            .map_err(|_| Error::UnexpectedResponse(format!("OK {announced}")))?;
        progress(0, size);

        self.conn.receive_into(sink, size, |done| progress(done, size)).await
    }

    /// Send `size` bytes from `source` as `name`. `progress` gets `(sent, total)`.
    pub async fn upload<R, P>(&mut self, name: &str, size: u64, source: &mut R, mut progress: P) -> Result<String>
    where
        R: AsyncRead + Unpin,
        P: FnMut(u64, u64),
    {
        protocol::validate_filename(name)?;
        let size_field = size.to_string();
        self.send(Command::Upload, &[name, &size_field]).await?;

        self.conn.send_from(source, size, |done| progress(done, size)).await?;
        self.expect_ok().await
    }

    /// End the session. The server sends no reply.
    pub async fn quit(mut self) -> Result<()> {
        self.send(Command::Quit, &[]).await?;
        self.conn.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn download_reads_payload_behind_status_line() {
        let (local, remote) = tokio::io::duplex(1024);
        let mut remote = BufReader::new(remote);

        // status line, payload and the next reply arrive in one write
        let server = tokio::spawn(async move {
            let mut line = String::new();
            remote.read_line(&mut line).await.unwrap();
            assert_eq!(line, "download a.txt\n");
            remote.write_all(b"OK 5\nhello").await.unwrap();

            line.clear();
            remote.read_line(&mut line).await.unwrap();
            assert_eq!(line, "list\n");
            remote.write_all(b"1\na.txt\n").await.unwrap();
        });

        let mut client = Client::new(local, None);
        let mut out = Vec::new();
        let mut last = (0, 0);
        let n = client.download("a.txt", &mut out, |d, t| last = (d, t)).await.unwrap();
        assert_eq!(n, 5);
        assert_eq!(out, b"hello");
        assert_eq!(last, (5, 5));

        assert_eq!(client.list().await.unwrap(), vec!["a.txt"]);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn remote_errors_surface() {
        let (local, mut remote) = tokio::io::duplex(1024);
        remote.write_all(b"ERROR: File not found: x.txt\n").await.unwrap();

        let mut client = Client::new(local, None);
        match client.delete("x.txt").await {
            Err(Error::Remote(msg)) => assert_eq!(msg, "File not found: x.txt"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_names_never_reach_the_wire() {
        let (local, _remote) = tokio::io::duplex(1024);
        let mut client = Client::new(local, None);

        assert!(matches!(client.delete("two words").await, Err(Error::InvalidArguments(_))));
        assert!(matches!(client.rename("a", "../b").await, Err(Error::InvalidArguments(_))));
    }
}
