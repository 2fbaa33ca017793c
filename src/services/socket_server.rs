use log::{debug, error, info, warn};
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

use super::dispatcher::Dispatcher;
use crate::config::settings::{ListenAddress, ServerConfig};
use crate::rpc::framing::{read_message, read_single};
use crate::utils::error::GatewayError;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct ConnectionHandler {
    dispatcher: Arc<Dispatcher>,
    max_request_bytes: usize,
    single_read: bool,
}

impl ConnectionHandler {
    pub fn new(dispatcher: Arc<Dispatcher>, config: &ServerConfig) -> Self {
        Self {
            dispatcher,
            max_request_bytes: config.max_request_bytes,
            single_read: config.single_read,
        }
    }

    /// Reads one request, dispatches it and writes the response back.
    ///
    /// A peer that hangs up before the response is written (broken pipe) is
    /// logged and ends the connection normally. Other I/O failures are
    /// returned to the caller.
    pub async fn handle<S>(&self, mut stream: S) -> Result<(), GatewayError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let payload = if self.single_read {
            read_single(&mut stream).await?
        } else {
            read_message(&mut stream, self.max_request_bytes).await?
        };

        if payload.is_empty() {
            debug!("Connection closed without a request");
            return Ok(());
        }
        debug!("<-- {}", String::from_utf8_lossy(&payload));

        let response = self.dispatcher.call(&payload).await;
        debug!("--> {}", String::from_utf8_lossy(&response));

        match write_response(&mut stream, &response).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                error!("Client went away before the response was written: {}", e);
                Ok(())
            }
            Err(e) => Err(GatewayError::CommunicationError(format!(
                "Failed to write response: {}",
                e
            ))),
        }
    }
}

async fn write_response<S>(stream: &mut S, response: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(response).await?;
    stream.flush().await?;
    if let Err(e) = stream.shutdown().await {
        debug!("Shutdown after response failed: {}", e);
    }
    Ok(())
}

enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(tokio::net::UnixListener, std::path::PathBuf),
}

pub struct GatewayServer {
    listener: Listener,
    handler: Arc<ConnectionHandler>,
    connections: AtomicU64,
}

impl GatewayServer {
    pub async fn bind(config: &ServerConfig, dispatcher: Arc<Dispatcher>) -> Result<Self, GatewayError> {
        let listener = match config.listen_address() {
            ListenAddress::Tcp(addr) => {
                let listener = TcpListener::bind(addr.as_str()).await.map_err(|e| {
                    GatewayError::ConnectionError(format!("Failed to bind {}: {}", addr, e))
                })?;
                Listener::Tcp(listener)
            }
            #[cfg(unix)]
            ListenAddress::Unix(path) => {
                remove_stale_socket(&path)?;
                let listener = tokio::net::UnixListener::bind(&path).map_err(|e| {
                    GatewayError::ConnectionError(format!("Failed to bind {}: {}", path.display(), e))
                })?;
                Listener::Unix(listener, path)
            }
            #[cfg(not(unix))]
            ListenAddress::Unix(path) => {
                return Err(GatewayError::ConfigError(format!(
                    "Unix sockets are not available on this platform, use tcp_listen instead of {}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            listener,
            handler: Arc::new(ConnectionHandler::new(dispatcher, config)),
            connections: AtomicU64::new(0),
        })
    }

    pub fn local_addr(&self) -> Result<ListenAddress, GatewayError> {
        match &self.listener {
            Listener::Tcp(listener) => Ok(ListenAddress::Tcp(listener.local_addr()?.to_string())),
            #[cfg(unix)]
            Listener::Unix(_, path) => Ok(ListenAddress::Unix(path.clone())),
        }
    }

    pub async fn serve<F>(self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()>,
    {
        info!("🔌 JSON-RPC server listening on {:?}", self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("🛑 Stopping JSON-RPC server...");
                    break;
                }
                accepted = self.accept() => {
                    if let Err(e) = accepted {
                        accept_failed(&e).await;
                    }
                }
            }
        }

        self.cleanup();
        Ok(())
    }

    pub async fn serve_until_ctrl_c(self) -> Result<(), GatewayError> {
        self.serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for Ctrl-C, running until killed: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    async fn accept(&self) -> io::Result<()> {
        match &self.listener {
            Listener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                self.spawn(stream, &peer.to_string());
            }
            #[cfg(unix)]
            Listener::Unix(listener, _) => {
                let (stream, _) = listener.accept().await?;
                self.spawn(stream, "unix socket");
            }
        }
        Ok(())
    }

    fn spawn<S>(&self, stream: S, peer: &str)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = self.connections.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("🔗 Connection #{} from {}", id, peer);
        let handler = self.handler.clone();
        tokio::spawn(async move {
            if let Err(e) = handler.handle(stream).await {
                warn!("❌ Connection #{} failed: {}", id, e);
            }
        });
    }

    fn cleanup(&self) {
        match &self.listener {
            Listener::Tcp(_) => {}
            #[cfg(unix)]
            Listener::Unix(_, path) => match std::fs::remove_file(path) {
                Ok(()) => info!("🧹 Removed socket {}", path.display()),
                Err(e) => warn!("Could not remove socket {}: {}", path.display(), e),
            },
        }
    }
}

/// `accept` fails immediately while descriptors are exhausted.
async fn accept_failed(e: &io::Error) {
    error!("Failed to accept connection: {}", e);
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

/// Removes a socket file left behind by a previous run. Anything else at
/// that path is left alone.
#[cfg(unix)]
fn remove_stale_socket(path: &std::path::Path) -> Result<(), GatewayError> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_socket() => {
            warn!("Replacing stale socket {}", path.display());
            std::fs::remove_file(path)?;
            Ok(())
        }
        Ok(_) => Err(GatewayError::ConfigError(format!(
            "{} exists and is not a socket",
            path.display()
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
