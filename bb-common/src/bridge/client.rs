//! Bridge client: connect, emit once, close

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::{debug, info, warn};

use super::protocol::ServiceInvocation;
use super::{BridgeEndpoint, BridgeError, DEFAULT_ENDPOINT};

/// Lifecycle of one client invocation
///
/// `Connecting → Connected → Emitted → Disconnecting → Closed`, or
/// `Connecting → Closed` when every connect attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connecting,
    Connected,
    Emitted,
    Disconnecting,
    Closed,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClientState::Connecting => "connecting",
            ClientState::Connected => "connected",
            ClientState::Emitted => "emitted",
            ClientState::Disconnecting => "disconnecting",
            ClientState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: BridgeEndpoint,
    /// Total connect attempts before giving up
    pub max_retries: u32,
    /// Pause between connect attempts
    pub retry_delay: Duration,
    /// Time the connection stays open after emitting
    pub grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: BridgeEndpoint::Tcp(DEFAULT_ENDPOINT.to_string()),
            max_retries: 3,
            retry_delay: Duration::from_millis(200),
            grace: Duration::from_secs(1),
        }
    }
}

type Connection = Box<dyn AsyncWrite + Send + Unpin>;

/// One-shot bridge client
///
/// Delivery is attempted at most once; the server never acknowledges.
pub struct BridgeClient {
    config: ClientConfig,
    state: ClientState,
    history: Vec<ClientState>,
}

impl BridgeClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            state: ClientState::Connecting,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Every state the client has passed through, in order
    pub fn history(&self) -> &[ClientState] {
        &self.history
    }

    fn transition(&mut self, next: ClientState) {
        debug!("Bridge client: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Deliver `invocation` to the server
    ///
    /// Fails with [`BridgeError::ConnectionFailed`] once the retry bound is
    /// exhausted; nothing is emitted in that case.
    pub async fn invoke(&mut self, invocation: &ServiceInvocation) -> Result<(), BridgeError> {
        // Encode first so a bad frame never opens a connection
        let line = invocation.encode()?;

        self.transition(ClientState::Connecting);
        let mut connection = match self.connect_with_retry().await {
            Some(connection) => connection,
            None => {
                self.transition(ClientState::Closed);
                return Err(BridgeError::ConnectionFailed {
                    endpoint: self.config.endpoint.to_string(),
                    attempts: self.config.max_retries.max(1),
                });
            }
        };
        self.transition(ClientState::Connected);

        let emitted = async {
            connection.write_all(line.as_bytes()).await?;
            connection.flush().await
        }
        .await;

        if let Err(e) = emitted {
            warn!("Bridge emit to {} failed: {}", self.config.endpoint, e);
            self.transition(ClientState::Disconnecting);
            let _ = connection.shutdown().await;
            self.transition(ClientState::Closed);
            return Err(e.into());
        }

        self.transition(ClientState::Emitted);
        info!(
            "Sent service {} to {} ({} args)",
            invocation.service_name,
            self.config.endpoint,
            invocation.args.len()
        );

        tokio::time::sleep(self.config.grace).await;

        self.transition(ClientState::Disconnecting);
        if let Err(e) = connection.shutdown().await {
            debug!("Bridge shutdown: {}", e);
        }
        self.transition(ClientState::Closed);
        Ok(())
    }

    async fn connect_with_retry(&self) -> Option<Connection> {
        let attempts = self.config.max_retries.max(1);

        for attempt in 1..=attempts {
            match connect(&self.config.endpoint).await {
                Ok(connection) => {
                    debug!("Connected to {} on attempt {}", self.config.endpoint, attempt);
                    return Some(connection);
                }
                Err(e) => {
                    warn!(
                        "Bridge connect to {} failed (attempt {}/{}): {}",
                        self.config.endpoint, attempt, attempts, e
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }
        None
    }
}

async fn connect(endpoint: &BridgeEndpoint) -> std::io::Result<Connection> {
    match endpoint {
        BridgeEndpoint::Tcp(addr) => Ok(Box::new(TcpStream::connect(addr).await?)),
        #[cfg(unix)]
        BridgeEndpoint::Unix(path) => Ok(Box::new(UnixStream::connect(path).await?)),
        #[cfg(not(unix))]
        BridgeEndpoint::Unix(path) => Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("unix sockets unavailable: {}", path.display()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn unused_endpoint() -> BridgeEndpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        BridgeEndpoint::Tcp(addr.to_string())
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_bound() {
        let mut client = BridgeClient::new(ClientConfig {
            endpoint: unused_endpoint().await,
            max_retries: 3,
            retry_delay: Duration::from_millis(5),
            grace: Duration::from_millis(5),
        });

        let err = client
            .invoke(&ServiceInvocation::new("test", vec![]))
            .await
            .unwrap_err();

        match err {
            BridgeError::ConnectionFailed { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(client.history(), &[ClientState::Connecting, ClientState::Closed]);
    }

    #[tokio::test]
    async fn test_walks_full_state_machine() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = BridgeEndpoint::Tcp(listener.local_addr().unwrap().to_string());
        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            stream
        });

        let mut client = BridgeClient::new(ClientConfig {
            endpoint,
            max_retries: 3,
            retry_delay: Duration::from_millis(5),
            grace: Duration::from_millis(5),
        });
        client
            .invoke(&ServiceInvocation::new("test", vec![]))
            .await
            .unwrap();
        let _stream = accept.await.unwrap();

        assert_eq!(
            client.history(),
            &[
                ClientState::Connecting,
                ClientState::Connected,
                ClientState::Emitted,
                ClientState::Disconnecting,
                ClientState::Closed,
            ]
        );
    }
}
