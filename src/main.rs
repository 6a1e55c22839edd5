use airpay_backend::api::{create_router, AppState};
use airpay_backend::config::AppConfig;
use airpay_backend::database::{init_pool_from_config, run_migrations};
use airpay_backend::health::HealthChecker;
use airpay_backend::logging::init_tracing;
use airpay_backend::payments::factory::GatewayRegistry;
use airpay_backend::services::create_payment::PaymentService;
use airpay_backend::services::payment_persistence::PaymentPersistenceCoordinator;
use airpay_backend::workers::payment_jobs::{JobQueue, JobTracker, PaymentJobWorker};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
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
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        gateways = ?config.gateways.enabled,
        "Starting payment bridge"
    );

    let db_pool = init_pool_from_config(&config.database).await.map_err(|e| {
        error!("Failed to initialize database pool: {}", e);
        e
    })?;
    run_migrations(&db_pool).await?;
    info!(
        max_connections = db_pool.options().get_max_connections(),
        "Database ready"
    );

    let gateways = GatewayRegistry::from_config(&config.gateways)?;
    let store = Arc::new(PaymentPersistenceCoordinator::new(
        db_pool.clone(),
        &config.persistence,
    ));
    let payments = PaymentService::new(gateways, store);

    let tracker = Arc::new(JobTracker::new());
    let (jobs, receiver) = JobQueue::new(config.worker.queue_capacity, tracker.clone());

    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let worker = PaymentJobWorker::new(receiver, tracker.clone(), payments.clone());
    let worker_handle = tokio::spawn(worker.run(worker_shutdown_rx));

    let state = Arc::new(AppState {
        payments,
        jobs,
        health: HealthChecker::new(Some(db_pool), tracker),
    });
    let app = create_router(state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(worker_shutdown_tx.clone()))
        .await?;

    let _ = worker_shutdown_tx.send(true);
    if tokio::time::timeout(Duration::from_secs(5), worker_handle)
        .await
        .is_err()
    {
        error!("Timed out waiting for payment job worker shutdown");
    }

    info!("Server shutdown complete");
    Ok(())
}
