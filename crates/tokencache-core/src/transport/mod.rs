//! Connection factory for real-time message channels.
//!
//! A `Connector` turns an address and an open options map into a live
//! bidirectional `Channel`. Connectors are stateless pass-throughs to the
//! underlying transport; which option keys mean anything is up to the
//! transport. The credential manager never performs network I/O itself;
//! hosts read `CredentialManager::access_token_id` and hand it to a
//! connector through the options.

pub mod tcp;

use std::future::Future;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};

pub use tcp::TcpConnector;

/// Transport-defined connection options.
pub type ConnectOptions = Map<String, Value>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid connect option: {0}")]
    InvalidOption(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(#[from] serde_json::Error),
}

/// Opens message channels to an address.
pub trait Connector {
    fn connect(
        &self,
        address: &str,
        options: &ConnectOptions,
    ) -> impl Future<Output = Result<Channel, TransportError>> + Send;
}

type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;
type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Bidirectional channel of JSON messages, one message per line.
pub struct Channel {
    reader: Lines<BufReader<BoxedReader>>,
    writer: BoxedWriter,
}

impl Channel {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let reader: BoxedReader = Box::new(reader);
        Self {
            reader: BufReader::new(reader).lines(),
            writer: Box::new(writer),
        }
    }

    pub async fn send(&mut self, message: &Value) -> Result<(), TransportError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next message, `None` once the peer has closed the channel.
    pub async fn recv(&mut self) -> Result<Option<Value>, TransportError> {
        loop {
            match self.reader.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(serde_json::from_str(&line)?)),
                None => return Ok(None),
            }
        }
    }

    pub async fn close(mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
