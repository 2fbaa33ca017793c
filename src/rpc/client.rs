use log::debug;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::envelope::JsonRpcRequest;
use super::framing::read_message;
use crate::config::settings::ListenAddress;
use crate::utils::error::GatewayError;

const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct RpcClient {
    target: ListenAddress,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(target: ListenAddress) -> Self {
        Self {
            target,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::new(ListenAddress::Unix(path.into()))
    }

    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::new(ListenAddress::Tcp(addr.into()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn call(&self, request: &JsonRpcRequest) -> Result<Value, GatewayError> {
        let payload = request.to_vec()?;
        let response = timeout(self.timeout, self.send(&payload)).await??;
        Ok(serde_json::from_slice(&response)?)
    }

    pub async fn send(&self, payload: &[u8]) -> Result<Vec<u8>, GatewayError> {
        match &self.target {
            ListenAddress::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).await.map_err(|e| {
                    GatewayError::ConnectionError(format!("Cannot connect to {}: {}", addr, e))
                })?;
                exchange(stream, payload).await
            }
            #[cfg(unix)]
            ListenAddress::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path).await.map_err(|e| {
                    GatewayError::ConnectionError(format!(
                        "Cannot connect to {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                exchange(stream, payload).await
            }
            #[cfg(not(unix))]
            ListenAddress::Unix(path) => Err(GatewayError::ConfigError(format!(
                "Unix sockets are not available on this platform: {}",
                path.display()
            ))),
        }
    }
}

async fn exchange<S>(mut stream: S, payload: &[u8]) -> Result<Vec<u8>, GatewayError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!("--> {}", String::from_utf8_lossy(payload));
    stream.write_all(payload).await?;
    stream.flush().await?;

    let response = read_message(&mut stream, MAX_RESPONSE_BYTES).await?;
    if response.is_empty() {
        return Err(GatewayError::InvalidResponse(
            "Connection closed without a response".to_string(),
        ));
    }
    debug!("<-- {}", String::from_utf8_lossy(&response));
    Ok(response)
}
