use hub::config::HubConfig;
use hub::Hub;

#[tokio::main]
async fn main() {
    wire::logging::init();

    let config = HubConfig::from_env().unwrap_or_else(|err| {
        tracing::error!(%err, "failed to load hub configuration");
        std::process::exit(1);
    });

    tracing::info!(
        chunks_per_file = config.chunks_per_file,
        replicas = config.replicas,
        "hub starting"
    );

    let hub = Hub::new(&config);

    let shutdown_signal = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let health = hub.spawn_health_monitor(shutdown_signal);

    // The HTTP/WebSocket API bridge that would otherwise register shards,
    // accept uploads, and drive `hub` through the `BlobHub` trait is an
    // external collaborator and is not started here.
    let _ = health.await;
}
