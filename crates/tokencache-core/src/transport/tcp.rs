use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpStream;
use tracing::debug;

use super::{Channel, ConnectOptions, Connector, TransportError};

/// Connect timeout when `timeout_ms` is not given.
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Line-delimited JSON over TCP.
///
/// Recognized options:
/// - `timeout_ms`: connect timeout in milliseconds
/// - `auth_token`: sent as `{"auth": <token>}` right after connecting
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

fn connect_timeout(options: &ConnectOptions) -> Result<u64, TransportError> {
    match options.get("timeout_ms") {
        None | Some(Value::Null) => Ok(DEFAULT_CONNECT_TIMEOUT_MS),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| TransportError::InvalidOption(format!("timeout_ms: {}", value))),
    }
}

fn auth_token(options: &ConnectOptions) -> Result<Option<String>, TransportError> {
    match options.get("auth_token") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(token)) => Ok(Some(token.clone())),
        Some(_) => Err(TransportError::InvalidOption(
            "auth_token must be a string".to_string(),
        )),
    }
}

impl Connector for TcpConnector {
    async fn connect(
        &self,
        address: &str,
        options: &ConnectOptions,
    ) -> Result<Channel, TransportError> {
        let timeout_ms = connect_timeout(options)?;
        let token = auth_token(options)?;

        debug!(address, timeout_ms, "Opening channel");
        let stream = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            TcpStream::connect(address),
        )
        .await
        .map_err(|_| TransportError::Timeout(timeout_ms))??;

        let (reader, writer) = stream.into_split();
        let mut channel = Channel::new(reader, writer);

        if let Some(token) = token {
            channel.send(&json!({ "auth": token })).await?;
        }
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[test]
    fn test_connect_timeout_option() {
        let mut options = ConnectOptions::new();
        assert_eq!(connect_timeout(&options).unwrap(), DEFAULT_CONNECT_TIMEOUT_MS);

        options.insert("timeout_ms".to_string(), json!(250));
        assert_eq!(connect_timeout(&options).unwrap(), 250);

        options.insert("timeout_ms".to_string(), json!("soon"));
        assert!(matches!(
            connect_timeout(&options),
            Err(TransportError::InvalidOption(_))
        ));
    }

    #[test]
    fn test_auth_token_option() {
        let mut options = ConnectOptions::new();
        assert_eq!(auth_token(&options).unwrap(), None);

        options.insert("auth_token".to_string(), json!("tok1"));
        assert_eq!(auth_token(&options).unwrap().as_deref(), Some("tok1"));

        options.insert("auth_token".to_string(), json!(42));
        assert!(auth_token(&options).is_err());
    }

    #[tokio::test]
    async fn test_connect_sends_auth_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            let handshake = lines.next_line().await.unwrap().unwrap();
            let message = lines.next_line().await.unwrap().unwrap();
            write.write_all(b"{\"ok\":true}\n").await.unwrap();
            (handshake, message)
        });

        let mut options = ConnectOptions::new();
        options.insert("auth_token".to_string(), json!("tok1"));

        let mut channel = TcpConnector::new().connect(&address, &options).await.unwrap();
        channel.send(&json!({"event": "hello"})).await.unwrap();
        assert_eq!(channel.recv().await.unwrap(), Some(json!({"ok": true})));

        let (handshake, message) = server.await.unwrap();
        assert_eq!(handshake, r#"{"auth":"tok1"}"#);
        assert_eq!(message, r#"{"event":"hello"}"#);
    }

    #[tokio::test]
    async fn test_connect_refused_is_io_error() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TcpConnector::new()
            .connect(&address, &ConnectOptions::new())
            .await;
        assert!(matches!(result, Err(TransportError::Io(_))));
    }
}
