//! API server entry point.

use api::Config;
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Pick the event store
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresEventStore::connect(&url).await?;
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL event store");
            serve(store, config, metrics_handle).await
        }
        None => {
            tracing::info!("using in-memory event store");
            serve(InMemoryEventStore::new(), config, metrics_handle).await
        }
    }
}

async fn serve<S: EventStore + Clone + 'static>(
    store: S,
    config: Config,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError> {
    let state = api::create_state(store, &config);

    // 4. Seed the demo fleet and replay existing events into the views
    if config.seed_demo_fleet {
        api::seed_demo_fleet(state.fleet(), config.depot).await?;
    }
    let replayed = state.scheduler.catch_up().await?;
    tracing::info!(replayed, "read models caught up");

    // 5. Start the dispatch scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = state.scheduler.clone();
    let scheduler_task = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    // 6. Serve until a shutdown signal
    let app = api::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // 7. Stop the scheduler after in-flight requests drain
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_task.await {
        tracing::error!(error = %e, "dispatch scheduler task failed");
    }

    served?;
    tracing::info!("server shut down gracefully");
    Ok(())
}
