use std::sync::Arc;

use shard_store::ShardStore;
use tokio::net::TcpListener;

fn base_dir() -> std::path::PathBuf {
    if let Ok(base) = std::env::var("SHARDER_BASE") {
        return base.into();
    }
    std::env::current_exe()
        .map(|mut path| {
            path.pop();
            path.push(".data");
            path
        })
        .unwrap_or_else(|_| ".data".into())
}

fn listen_addr() -> String {
    std::env::var("SHARD_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:12345".to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    wire::logging::init();

    let base = base_dir();
    let addr = listen_addr();

    let store = Arc::new(ShardStore::open(&base).unwrap_or_else(|err| {
        tracing::error!(%err, path = %base.display(), "failed to open shard store");
        std::process::exit(1);
    }));

    let listener = TcpListener::bind(&addr).await.unwrap_or_else(|err| {
        tracing::error!(%err, %addr, "failed to bind shard listen address");
        std::process::exit(1);
    });
    tracing::info!(%addr, path = %base.display(), "shard server listening");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    shard_server::serve(listener, store, shutdown).await
}
