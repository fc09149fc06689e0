//! Binary opcode framing for the shard wire protocol (`spec.md` §4.2).
//!
//! All multi-byte integers are big-endian. Each request opens with a
//! 1-byte opcode; the remaining fixed fields and any variable-length
//! payload are read directly off the stream rather than buffered into one
//! fixed-size header up front — the wire bytes are identical either way,
//! this just reads each field as it is needed.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Digests longer than this are rejected outright; real traffic always
/// carries a 32-byte HMAC-SHA-256, so anything past this is malformed.
pub const MAX_HMAC_LEN: u16 = 64;

/// Upper bound on a single chunk's size, guarding against a hostile or
/// corrupt length prefix driving an unbounded allocation.
pub const MAX_CHUNK_LEN: u32 = 64 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("connection closed before a complete message was read")]
    Io(#[from] std::io::Error),
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("hmac_len {0} exceeds the maximum of {MAX_HMAC_LEN}")]
    HmacLenOutOfBounds(u16),
    #[error("chunk length {0} exceeds the maximum of {MAX_CHUNK_LEN}")]
    ChunkLenOutOfBounds(u32),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    Store = 0x01,
    Retrieve = 0x02,
    Delete = 0x03,
    Ping = 0x04,
}

impl Opcode {
    fn from_byte(b: u8) -> Result<Self, CodecError> {
        match b {
            0x01 => Ok(Opcode::Store),
            0x02 => Ok(Opcode::Retrieve),
            0x03 => Ok(Opcode::Delete),
            0x04 => Ok(Opcode::Ping),
            other => Err(CodecError::UnknownOpcode(other)),
        }
    }
}

/// A fully decoded request, as read by the shard server.
#[derive(Debug)]
pub enum Request {
    Store {
        chunk_index: u32,
        digest: Vec<u8>,
        chunk: Vec<u8>,
    },
    Retrieve {
        chunk_index: u32,
        digest: Vec<u8>,
    },
    Delete {
        digest: Vec<u8>,
    },
    Ping,
}

async fn read_digest_of_len<R: AsyncRead + Unpin>(
    stream: &mut R,
    hmac_len: u16,
) -> Result<Vec<u8>, CodecError> {
    let mut digest = vec![0u8; hmac_len as usize];
    stream.read_exact(&mut digest).await?;
    Ok(digest)
}

async fn read_digest<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<u8>, CodecError> {
    let hmac_len = stream.read_u16().await?;
    if hmac_len > MAX_HMAC_LEN {
        return Err(CodecError::HmacLenOutOfBounds(hmac_len));
    }
    read_digest_of_len(stream, hmac_len).await
}

async fn write_digest<W: AsyncWrite + Unpin>(stream: &mut W, digest: &[u8]) -> std::io::Result<()> {
    stream.write_u16(digest.len() as u16).await?;
    stream.write_all(digest).await
}

/// Reads one request off `stream`, dispatching on the leading opcode byte.
pub async fn read_request<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Request, CodecError> {
    let opcode = Opcode::from_byte(stream.read_u8().await?)?;
    match opcode {
        Opcode::Store => {
            let chunk_index = stream.read_u32().await?;
            let hmac_len = stream.read_u16().await?;
            if hmac_len > MAX_HMAC_LEN {
                return Err(CodecError::HmacLenOutOfBounds(hmac_len));
            }
            let data_len = stream.read_u32().await?;
            if data_len > MAX_CHUNK_LEN {
                return Err(CodecError::ChunkLenOutOfBounds(data_len));
            }
            let digest = read_digest_of_len(stream, hmac_len).await?;
            let mut chunk = vec![0u8; data_len as usize];
            stream.read_exact(&mut chunk).await?;
            Ok(Request::Store {
                chunk_index,
                digest,
                chunk,
            })
        }
        Opcode::Retrieve => {
            let chunk_index = stream.read_u32().await?;
            let digest = read_digest(stream).await?;
            Ok(Request::Retrieve {
                chunk_index,
                digest,
            })
        }
        Opcode::Delete => {
            let digest = read_digest(stream).await?;
            Ok(Request::Delete { digest })
        }
        Opcode::Ping => Ok(Request::Ping),
    }
}

/// Writes a STORE request (hub -> shard side).
pub async fn write_store_request<W: AsyncWrite + Unpin>(
    stream: &mut W,
    chunk_index: u32,
    digest: &[u8],
    chunk: &[u8],
) -> std::io::Result<()> {
    stream.write_u8(Opcode::Store as u8).await?;
    stream.write_u32(chunk_index).await?;
    stream.write_u16(digest.len() as u16).await?;
    stream.write_u32(chunk.len() as u32).await?;
    stream.write_all(digest).await?;
    stream.write_all(chunk).await?;
    stream.flush().await
}

/// Reads the STORE response. A closed connection or any read failure is
/// reported as `Ok(false)`: per `spec.md` §4.2, a shard that failed to read
/// the full payload sends no response at all, which is indistinguishable
/// on the wire from "not successful".
pub async fn read_store_response<R: AsyncRead + Unpin>(stream: &mut R) -> bool {
    matches!(stream.read_u8().await, Ok(0x01))
}

pub async fn write_store_response<W: AsyncWrite + Unpin>(stream: &mut W) -> std::io::Result<()> {
    stream.write_u8(0x01).await?;
    stream.flush().await
}

/// Writes a RETRIEVE request (hub -> shard side).
pub async fn write_retrieve_request<W: AsyncWrite + Unpin>(
    stream: &mut W,
    chunk_index: u32,
    digest: &[u8],
) -> std::io::Result<()> {
    stream.write_u8(Opcode::Retrieve as u8).await?;
    stream.write_u32(chunk_index).await?;
    write_digest(stream, digest).await?;
    stream.flush().await
}

pub async fn write_retrieve_response<W: AsyncWrite + Unpin>(
    stream: &mut W,
    data: Option<&[u8]>,
) -> std::io::Result<()> {
    match data {
        Some(bytes) => {
            stream.write_u8(0x01).await?;
            stream.write_u32(bytes.len() as u32).await?;
            stream.write_all(bytes).await?;
        }
        None => {
            stream.write_u8(0x00).await?;
        }
    }
    stream.flush().await
}

/// Reads the RETRIEVE response. Any malformed or truncated response is
/// treated as a miss, matching the hub's "continue to the next shard"
/// policy for `ProtocolError` during reconstruction.
pub async fn read_retrieve_response<R: AsyncRead + Unpin>(
    stream: &mut R,
) -> Result<Option<Vec<u8>>, CodecError> {
    let status = stream.read_u8().await?;
    if status != 0x01 {
        return Ok(None);
    }
    let chunk_len = stream.read_u32().await?;
    if chunk_len > MAX_CHUNK_LEN {
        return Err(CodecError::ChunkLenOutOfBounds(chunk_len));
    }
    let mut buf = vec![0u8; chunk_len as usize];
    stream.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

/// Writes a DELETE request (hub -> shard side).
pub async fn write_delete_request<W: AsyncWrite + Unpin>(
    stream: &mut W,
    digest: &[u8],
) -> std::io::Result<()> {
    stream.write_u8(Opcode::Delete as u8).await?;
    write_digest(stream, digest).await?;
    stream.flush().await
}

pub async fn write_delete_response<W: AsyncWrite + Unpin>(
    stream: &mut W,
    removed: bool,
) -> std::io::Result<()> {
    stream.write_u8(if removed { 0x01 } else { 0x00 }).await?;
    stream.flush().await
}

pub async fn read_delete_response<R: AsyncRead + Unpin>(stream: &mut R) -> Result<bool, CodecError> {
    Ok(stream.read_u8().await? == 0x01)
}

/// Writes a PING request (hub -> shard side).
pub async fn write_ping_request<W: AsyncWrite + Unpin>(stream: &mut W) -> std::io::Result<()> {
    stream.write_u8(Opcode::Ping as u8).await?;
    stream.flush().await
}

pub async fn write_ping_response<W: AsyncWrite + Unpin>(
    stream: &mut W,
    total_bytes: u32,
) -> std::io::Result<()> {
    stream.write_u32(total_bytes).await?;
    stream.flush().await
}

/// Reads the PING response: a bare `u32`, with no leading status byte.
pub async fn read_ping_response<R: AsyncRead + Unpin>(stream: &mut R) -> Result<u32, CodecError> {
    Ok(stream.read_u32().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::duplex;

    #[tokio::test]
    async fn store_round_trip() {
        let (mut client, mut server) = duplex(4096);
        write_store_request(&mut client, 2, &[7u8; 32], b"hello").await.unwrap();
        match read_request(&mut server).await.unwrap() {
            Request::Store {
                chunk_index,
                digest,
                chunk,
            } => {
                assert_eq!(chunk_index, 2);
                assert_eq!(digest, vec![7u8; 32]);
                assert_eq!(chunk, b"hello");
            }
            other => panic!("unexpected request: {other:?}"),
        }
        write_store_response(&mut server).await.unwrap();
        assert!(read_store_response(&mut client).await);
    }

    #[tokio::test]
    async fn retrieve_round_trip_hit_and_miss() {
        let (mut client, mut server) = duplex(4096);
        write_retrieve_request(&mut client, 0, &[1u8; 32]).await.unwrap();
        match read_request(&mut server).await.unwrap() {
            Request::Retrieve { chunk_index, digest } => {
                assert_eq!(chunk_index, 0);
                assert_eq!(digest, vec![1u8; 32]);
            }
            other => panic!("unexpected request: {other:?}"),
        }
        write_retrieve_response(&mut server, Some(b"world")).await.unwrap();
        assert_eq!(
            read_retrieve_response(&mut client).await.unwrap(),
            Some(b"world".to_vec())
        );

        let (mut client, mut server) = duplex(4096);
        write_retrieve_request(&mut client, 0, &[1u8; 32]).await.unwrap();
        let _ = read_request(&mut server).await.unwrap();
        write_retrieve_response(&mut server, None).await.unwrap();
        assert_eq!(read_retrieve_response(&mut client).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_round_trip() {
        let (mut client, mut server) = duplex(4096);
        write_delete_request(&mut client, &[9u8; 32]).await.unwrap();
        match read_request(&mut server).await.unwrap() {
            Request::Delete { digest } => assert_eq!(digest, vec![9u8; 32]),
            other => panic!("unexpected request: {other:?}"),
        }
        write_delete_response(&mut server, true).await.unwrap();
        assert!(read_delete_response(&mut client).await.unwrap());
    }

    #[tokio::test]
    async fn ping_round_trip() {
        let (mut client, mut server) = duplex(4096);
        write_ping_request(&mut client).await.unwrap();
        match read_request(&mut server).await.unwrap() {
            Request::Ping => {}
            other => panic!("unexpected request: {other:?}"),
        }
        write_ping_response(&mut server, 4096).await.unwrap();
        assert_eq!(read_ping_response(&mut client).await.unwrap(), 4096);
    }

    #[tokio::test]
    async fn zero_length_chunk_is_accepted() {
        let (mut client, mut server) = duplex(4096);
        write_store_request(&mut client, 0, &[0u8; 32], b"").await.unwrap();
        match read_request(&mut server).await.unwrap() {
            Request::Store { chunk, .. } => assert!(chunk.is_empty()),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_oversized_hmac_len() {
        let (mut client, mut server) = duplex(4096);
        client.write_all(&[Opcode::Retrieve as u8]).await.unwrap();
        client.write_all(&0u32.to_be_bytes()).await.unwrap();
        client.write_all(&200u16.to_be_bytes()).await.unwrap();
        drop(client);
        assert!(matches!(
            read_request(&mut server).await,
            Err(CodecError::HmacLenOutOfBounds(200))
        ));
    }

    #[quickcheck_macros::quickcheck]
    fn store_request_round_trips_any_payload(chunk_index: u32, digest: Vec<u8>, chunk: Vec<u8>) -> bool {
        let digest: Vec<u8> = digest.into_iter().take(MAX_HMAC_LEN as usize).collect();
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(async {
                let (mut client, mut server) = duplex(chunk.len() + 4096);
                write_store_request(&mut client, chunk_index, &digest, &chunk)
                    .await
                    .unwrap();
                match read_request(&mut server).await.unwrap() {
                    Request::Store {
                        chunk_index: ci,
                        digest: d,
                        chunk: c,
                    } => ci == chunk_index && d == digest && c == chunk,
                    _ => false,
                }
            })
    }
}
