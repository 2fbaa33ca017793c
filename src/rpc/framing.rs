use log::warn;
use serde::de::IgnoredAny;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::settings::LEGACY_READ_SIZE;

/// True once `buffer` holds one complete JSON value, or bytes that no
/// amount of further input could turn into one.
pub fn is_complete_message(buffer: &[u8]) -> bool {
    if buffer.trim_ascii().is_empty() {
        return false;
    }
    let mut values = serde_json::Deserializer::from_slice(buffer).into_iter::<IgnoredAny>();
    match values.next() {
        Some(Ok(_)) => true,
        Some(Err(e)) => !e.is_eof(),
        None => false,
    }
}

/// Reads one message: until a complete JSON value, end of stream, or
/// `limit` bytes, whichever comes first.
pub async fn read_message<R>(reader: &mut R, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(LEGACY_READ_SIZE);
    let mut chunk = [0u8; LEGACY_READ_SIZE];

    while buffer.len() < limit {
        let wanted = chunk.len().min(limit - buffer.len());
        let n = reader.read(&mut chunk[..wanted]).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if is_complete_message(&buffer) {
            return Ok(buffer);
        }
    }

    if buffer.len() >= limit {
        warn!("Message reached the {} byte limit before it was complete", limit);
    }
    Ok(buffer)
}

pub async fn read_single<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; LEGACY_READ_SIZE];
    let n = reader.read(&mut buffer).await?;
    buffer.truncate(n);
    Ok(buffer)
}
