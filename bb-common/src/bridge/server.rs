//! Bridge server: accepts connections and runs registered services

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use super::protocol::ServiceInvocation;
use super::{BridgeEndpoint, BridgeError};
use crate::registry::{DispatchError, Registry};

/// Services take their arguments and produce nothing
pub type ServiceRegistry<C> = Registry<C, ()>;

type Connection = Box<dyn AsyncRead + Send + Unpin>;

/// Longest frame the server reads, newline included
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Result of reading one frame off a connection
#[derive(Debug, PartialEq, Eq)]
enum FrameRead {
    Line(String),
    /// Peer sent `MAX_FRAME_BYTES` without a newline
    Oversized,
    Closed,
}

/// Read one newline-terminated frame, never buffering more than `MAX_FRAME_BYTES`
///
/// A final frame cut short by EOF is still returned.
async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<FrameRead> {
    buf.clear();
    let limit = MAX_FRAME_BYTES as u64;
    let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;

    if read == 0 {
        return Ok(FrameRead::Closed);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if read as u64 == limit {
        return Ok(FrameRead::Oversized);
    }

    let line = std::str::from_utf8(buf)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(FrameRead::Line(line.to_string()))
}

/// Bound server socket
pub enum BridgeListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener, PathBuf),
}

impl BridgeListener {
    /// Bind the endpoint
    ///
    /// A stale Unix socket file left behind by a previous run is removed first.
    pub async fn bind(endpoint: &BridgeEndpoint) -> Result<Self, BridgeError> {
        match endpoint {
            BridgeEndpoint::Tcp(addr) => Ok(BridgeListener::Tcp(TcpListener::bind(addr).await?)),
            #[cfg(unix)]
            BridgeEndpoint::Unix(path) => {
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
                Ok(BridgeListener::Unix(UnixListener::bind(path)?, path.clone()))
            }
            #[cfg(not(unix))]
            BridgeEndpoint::Unix(path) => Err(BridgeError::InvalidEndpoint(format!(
                "unix:{}",
                path.display()
            ))),
        }
    }

    /// Endpoint actually bound (resolves port 0 to the assigned port)
    pub fn local_endpoint(&self) -> Result<BridgeEndpoint, BridgeError> {
        match self {
            BridgeListener::Tcp(listener) => Ok(BridgeEndpoint::Tcp(listener.local_addr()?.to_string())),
            #[cfg(unix)]
            BridgeListener::Unix(_, path) => Ok(BridgeEndpoint::Unix(path.clone())),
        }
    }

    async fn accept(&self) -> std::io::Result<(Connection, String)> {
        match self {
            BridgeListener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                Ok((Box::new(stream), peer.to_string()))
            }
            #[cfg(unix)]
            BridgeListener::Unix(listener, path) => {
                let (stream, _) = listener.accept().await?;
                Ok((Box::new(stream), path.display().to_string()))
            }
        }
    }
}

#[cfg(unix)]
impl Drop for BridgeListener {
    fn drop(&mut self) {
        if let BridgeListener::Unix(_, path) = self {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Long-lived end of the bridge
///
/// Every invocation runs on its own task, so a slow service never holds up the
/// accept loop or other connections.
pub struct BridgeServer<C> {
    services: Arc<ServiceRegistry<C>>,
    ctx: Arc<C>,
}

impl<C> Clone for BridgeServer<C> {
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

impl<C: Send + Sync + 'static> BridgeServer<C> {
    pub fn new(services: ServiceRegistry<C>, ctx: Arc<C>) -> Self {
        Self {
            services: Arc::new(services),
            ctx,
        }
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run(self, listener: BridgeListener, shutdown: impl Future<Output = ()>) -> Result<(), BridgeError> {
        info!(
            "Command bridge listening on {} ({} services)",
            listener.local_endpoint()?,
            self.services.len()
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Command bridge shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((connection, peer)) => {
                            debug!("Bridge connection from {}", peer);
                            let server = self.clone();
                            tokio::spawn(async move {
                                server.handle_connection(connection, peer).await;
                            });
                        }
                        Err(e) => {
                            // Accept errors (fd exhaustion etc.) must not end the server
                            error!("Bridge accept failed: {}", e);
                        }
                    }
                }
            }
        }
    }

    /// Read frames until the peer disconnects
    async fn handle_connection(&self, connection: Connection, peer: String) {
        let mut reader = BufReader::new(connection);
        let mut buf = Vec::new();

        loop {
            match read_frame(&mut reader, &mut buf).await {
                Ok(FrameRead::Line(line)) if line.trim().is_empty() => continue,
                Ok(FrameRead::Line(line)) => match ServiceInvocation::decode(&line) {
                    Ok(invocation) => {
                        self.invoke(invocation);
                    }
                    Err(e) => warn!("Dropping bridge frame from {}: {}", peer, e),
                },
                Ok(FrameRead::Oversized) => {
                    warn!(
                        "Bridge frame from {} exceeds {} bytes, closing connection",
                        peer, MAX_FRAME_BYTES
                    );
                    return;
                }
                Ok(FrameRead::Closed) => {
                    debug!("Bridge connection from {} closed", peer);
                    return;
                }
                Err(e) => {
                    warn!("Bridge connection from {} failed: {}", peer, e);
                    return;
                }
            }
        }
    }

    /// Run a service on its own task; unknown names are logged and dropped
    pub fn invoke(&self, invocation: ServiceInvocation) -> Option<tokio::task::JoinHandle<()>> {
        match self.services.lookup(&invocation.service_name) {
            Ok(service) => {
                info!(
                    "Running bridge service {} with {} args",
                    service.name,
                    invocation.args.len()
                );
                Some(tokio::spawn(service.call(self.ctx.clone(), invocation.args)))
            }
            Err(DispatchError::NotFound { name, .. }) => {
                warn!("Invalid service called: {}", name);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Vec<String>>>,
    }

    fn server() -> (BridgeServer<Recorder>, Arc<Recorder>) {
        let mut services: ServiceRegistry<Recorder> = ServiceRegistry::new("Service");
        services.register("record", "Records its arguments", "record a b", |ctx: Arc<Recorder>, args| async move {
            ctx.calls.lock().unwrap().push(args);
        });
        let ctx = Arc::new(Recorder::default());
        (BridgeServer::new(services, ctx.clone()), ctx)
    }

    #[tokio::test]
    async fn test_invoke_known_service() {
        let (server, ctx) = server();
        let handle = server
            .invoke(ServiceInvocation::new("record", vec!["x".to_string()]))
            .unwrap();
        handle.await.unwrap();

        assert_eq!(*ctx.calls.lock().unwrap(), vec![vec!["x".to_string()]]);
    }

    #[tokio::test]
    async fn test_read_frame_splits_lines() {
        let mut input: &[u8] = b"one\r\ntwo\n\nlast";
        let mut buf = Vec::new();

        let mut frames = Vec::new();
        loop {
            match read_frame(&mut input, &mut buf).await.unwrap() {
                FrameRead::Closed => break,
                frame => frames.push(frame),
            }
        }
        assert_eq!(
            frames,
            vec![
                FrameRead::Line("one".to_string()),
                FrameRead::Line("two".to_string()),
                FrameRead::Line(String::new()),
                FrameRead::Line("last".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_read_frame_caps_length() {
        let mut fits = vec![b'a'; MAX_FRAME_BYTES - 1];
        fits.push(b'\n');
        let mut input: &[u8] = &fits;
        let mut buf = Vec::new();
        match read_frame(&mut input, &mut buf).await.unwrap() {
            FrameRead::Line(line) => assert_eq!(line.len(), MAX_FRAME_BYTES - 1),
            other => panic!("expected a line, got {:?}", other),
        }

        let endless = vec![b'a'; MAX_FRAME_BYTES * 2];
        let mut input: &[u8] = &endless;
        assert_eq!(read_frame(&mut input, &mut buf).await.unwrap(), FrameRead::Oversized);
        assert!(buf.len() <= MAX_FRAME_BYTES);
    }

    #[tokio::test]
    async fn test_invoke_unknown_service_is_dropped() {
        let (server, ctx) = server();
        assert!(server.invoke(ServiceInvocation::new("missing", vec![])).is_none());
        assert!(ctx.calls.lock().unwrap().is_empty());
    }
}
