//! The shard node's TCP front end: accepts connections, reads one request
//! per connection off the wire codec, dispatches it against a
//! [`shard_store::ShardStore`], and closes the socket. No pipelining and no
//! admission control, per the wire protocol's single-request-per-connection
//! shape.

use std::future::Future;
use std::sync::Arc;

use shard_store::ShardStore;
use tokio::net::{TcpListener, TcpStream};
use wire::codec::{self, Request};

/// Accepts connections on `listener` until `shutdown` resolves, handling
/// each one on its own spawned task.
pub async fn serve(
    listener: TcpListener,
    store: Arc<ShardStore>,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = accepted?;
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(socket, store).await {
                        tracing::debug!(%peer, %err, "connection closed with an error");
                    }
                });
            }
            _ = &mut shutdown => {
                tracing::info!("shard server shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_connection(mut socket: TcpStream, store: Arc<ShardStore>) -> std::io::Result<()> {
    let request = match codec::read_request(&mut socket).await {
        Ok(request) => request,
        Err(err) => {
            tracing::debug!(%err, "malformed request");
            return Ok(());
        }
    };

    match request {
        Request::Store {
            chunk_index,
            digest,
            chunk,
        } => {
            let result = {
                let store = Arc::clone(&store);
                tokio::task::spawn_blocking(move || store.save(&digest, chunk_index, &chunk))
                    .await
                    .expect("save task panicked")
            };
            match result {
                Ok(()) => codec::write_store_response(&mut socket).await,
                Err(err) => {
                    tracing::debug!(%err, "store failed");
                    Ok(())
                }
            }
        }
        Request::Retrieve { chunk_index, digest } => {
            let result = {
                let store = Arc::clone(&store);
                tokio::task::spawn_blocking(move || store.load(&digest, chunk_index))
                    .await
                    .expect("load task panicked")
            };
            match result {
                Ok(data) => codec::write_retrieve_response(&mut socket, data.as_deref()).await,
                Err(err) => {
                    tracing::debug!(%err, "retrieve failed");
                    codec::write_retrieve_response(&mut socket, None).await
                }
            }
        }
        Request::Delete { digest } => {
            let result = {
                let store = Arc::clone(&store);
                tokio::task::spawn_blocking(move || store.destroy(&digest))
                    .await
                    .expect("destroy task panicked")
            };
            match result {
                Ok(removed) => codec::write_delete_response(&mut socket, removed).await,
                Err(err) => {
                    tracing::debug!(%err, "delete failed");
                    codec::write_delete_response(&mut socket, false).await
                }
            }
        }
        Request::Ping => {
            let total = store.size().min(u32::MAX as u64) as u32;
            codec::write_ping_response(&mut socket, total).await
        }
    }
}
