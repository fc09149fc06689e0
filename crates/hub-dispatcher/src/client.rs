//! A minimal, unpooled client for one shard dialogue. Built the same way
//! `gazette::Router` hands out a ready connection per member: dial, do the
//! one exchange the caller asked for, and let the socket drop — no pooling,
//! since nothing shares a socket across operations in this protocol.
//!
//! Every connect, send, and recv is wrapped in the 5-second per-operation
//! timeout `spec.md` §5 requires on the hub side; a shard that doesn't
//! answer in time is treated the same as one that actively refused.

use std::time::Duration;

use wire::{codec, ShardAddress};

/// Per-operation timeout applied to each connect/send/recv, per `spec.md` §5.
pub const OP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect to shard {address}: {source}")]
    Connect {
        address: ShardAddress,
        #[source]
        source: std::io::Error,
    },
    #[error("transport error talking to shard {address}: {source}")]
    Transport {
        address: ShardAddress,
        #[source]
        source: std::io::Error,
    },
    #[error("protocol error talking to shard {address}: {source}")]
    Protocol {
        address: ShardAddress,
        #[source]
        source: codec::CodecError,
    },
}

fn timed_out() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::TimedOut, "operation timed out")
}

async fn dial(address: &ShardAddress) -> Result<tokio::net::TcpStream, ClientError> {
    let connect = tokio::net::TcpStream::connect(address.to_socket_string());
    match tokio::time::timeout(OP_TIMEOUT, connect).await {
        Ok(Ok(socket)) => Ok(socket),
        Ok(Err(source)) => Err(ClientError::Connect {
            address: address.clone(),
            source,
        }),
        Err(_) => Err(ClientError::Connect {
            address: address.clone(),
            source: timed_out(),
        }),
    }
}

async fn send_with_timeout<F, T>(address: &ShardAddress, fut: F) -> Result<T, ClientError>
where
    F: std::future::Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(OP_TIMEOUT, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(ClientError::Transport {
            address: address.clone(),
            source,
        }),
        Err(_) => Err(ClientError::Transport {
            address: address.clone(),
            source: timed_out(),
        }),
    }
}

async fn recv_with_timeout<F, T>(address: &ShardAddress, fut: F) -> Result<T, ClientError>
where
    F: std::future::Future<Output = Result<T, codec::CodecError>>,
{
    match tokio::time::timeout(OP_TIMEOUT, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(ClientError::Protocol {
            address: address.clone(),
            source,
        }),
        Err(_) => Err(ClientError::Protocol {
            address: address.clone(),
            source: codec::CodecError::Io(timed_out()),
        }),
    }
}

pub async fn store_chunk(
    address: &ShardAddress,
    chunk_index: u32,
    digest: &[u8],
    chunk: &[u8],
) -> Result<bool, ClientError> {
    let mut socket = dial(address).await?;
    send_with_timeout(
        address,
        codec::write_store_request(&mut socket, chunk_index, digest, chunk),
    )
    .await?;
    Ok(tokio::time::timeout(OP_TIMEOUT, codec::read_store_response(&mut socket))
        .await
        .unwrap_or(false))
}

pub async fn retrieve_chunk(
    address: &ShardAddress,
    chunk_index: u32,
    digest: &[u8],
) -> Result<Option<Vec<u8>>, ClientError> {
    let mut socket = dial(address).await?;
    send_with_timeout(
        address,
        codec::write_retrieve_request(&mut socket, chunk_index, digest),
    )
    .await?;
    recv_with_timeout(address, codec::read_retrieve_response(&mut socket)).await
}

pub async fn delete_digest(address: &ShardAddress, digest: &[u8]) -> Result<bool, ClientError> {
    let mut socket = dial(address).await?;
    send_with_timeout(address, codec::write_delete_request(&mut socket, digest)).await?;
    recv_with_timeout(address, codec::read_delete_response(&mut socket)).await
}
