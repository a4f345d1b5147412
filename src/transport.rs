//! Line-oriented transport for the server connection.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{self, TcpStream};
use tracing::{debug, error, info, instrument, trace};

use crate::Error;

/// A source of inbound lines, stripped of their line terminator.
#[async_trait]
pub trait LineReader: Send {
    /// Reads the next line. Returns `None` when the stream has ended.
    async fn read_line(&mut self) -> Option<String>;
}

/// A sink for outbound protocol lines.
#[async_trait]
pub trait LineWriter: Send {
    /// Sends one line, appending the line terminator. Returns whether the peer is still
    /// reachable.
    async fn send(&mut self, line: &str) -> bool;
}

/// Attempts to resolve the given `host` and returns a list of addresses in random order on
/// success.
#[instrument]
async fn resolve(host: &str, port: u16) -> Result<Vec<std::net::SocketAddr>, Error> {
    let mut addrs = net::lookup_host((host, port))
        .await
        .map_err(Error::HostnameResolutionFailed)?
        .collect::<Vec<_>>();

    // Shuffle the addresses in-place in case there's no round-robin DNS
    addrs.shuffle(&mut rand::thread_rng());

    Ok(addrs)
}

/// The read half of a server connection, yielding one line at a time.
///
/// Lines are decoded lossily, a stray non-UTF-8 byte does not kill the session.
#[derive(Debug)]
pub struct TcpLineReader {
    reader: BufReader<OwnedReadHalf>,
}

#[async_trait]
impl LineReader for TcpLineReader {
    async fn read_line(&mut self) -> Option<String> {
        let mut buf = Vec::new();

        match self.reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\r' | b'\n')) {
                    buf.pop();
                }

                Some(String::from_utf8_lossy(&buf).into_owned())
            }
        }
    }
}

/// The write half of a server connection.
#[derive(Debug)]
pub struct TcpLineWriter {
    writer: OwnedWriteHalf,
}

#[async_trait]
impl LineWriter for TcpLineWriter {
    async fn send(&mut self, line: &str) -> bool {
        trace!(%line, "writing line");

        let data = format!("{line}\r\n");

        if self.writer.write_all(data.as_bytes()).await.is_err() {
            return false;
        }

        self.writer.flush().await.is_ok()
    }
}

/// Opens an unencrypted connection to the given `host` on the given `port` and splits it
/// into a line reader and a line writer.
///
/// If the host is a DNS hostname, this will attempt to resolve it and try to connect to
/// the resolved addresses in random order.
///
/// # Errors
///
/// Returns an [`Error`] when the hostname does not resolve, or when none of the resolved
/// addresses accept a connection.
#[instrument]
pub async fn connect(host: &str, port: u16) -> Result<(TcpLineReader, TcpLineWriter), Error> {
    trace!("Resolving hostname");

    let addrs = resolve(host, port).await?;

    trace!(?addrs);

    for addr in &addrs {
        debug!(%addr, "Opening connection");

        let stream = match TcpStream::connect(&addr).await {
            Ok(stream) => stream,
            Err(err) => {
                debug!(%addr, ?err, "Connection failed");

                continue;
            }
        };

        info!(%addr, "Connection established");

        let (read, write) = stream.into_split();

        return Ok((
            TcpLineReader {
                reader: BufReader::new(read),
            },
            TcpLineWriter { writer: write },
        ));
    }

    error!(?addrs, "Unable to connect to any of the resolved addresses");

    Err(Error::ConnectionFailed)
}
