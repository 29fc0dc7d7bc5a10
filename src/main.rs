//! viveum-offsite server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use viveum_offsite::adapters::http::{payment_router, PaymentAppState};
use viveum_offsite::adapters::{
    InMemoryConfirmationRepository, InMemoryOrderRepository, PostgresConfirmationRepository,
    PostgresOrderRepository,
};
use viveum_offsite::config::{AppConfig, DatabaseConfig, ServerConfig};
use viveum_offsite::ports::{ConfirmationRepository, OrderRepository};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        pspid = %config.payment.pspid,
        "viveum-offsite starting"
    );

    let (orders, confirmations) = match &config.database {
        Some(database) => connect_postgres(database).await?,
        None => {
            warn!("No database configured, orders and confirmations are kept in memory");
            let orders: Arc<dyn OrderRepository> = Arc::new(InMemoryOrderRepository::new());
            let confirmations: Arc<dyn ConfirmationRepository> =
                Arc::new(InMemoryConfirmationRepository::new());
            (orders, confirmations)
        }
    };

    let state = PaymentAppState::from_config(&config, orders, confirmations)?;
    let app = payment_router()
        .with_state(state)
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shut down");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if server.is_production() {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn connect_postgres(
    database: &DatabaseConfig,
) -> Result<(Arc<dyn OrderRepository>, Arc<dyn ConfirmationRepository>), BoxError> {
    let pool = PgPoolOptions::new()
        .min_connections(database.min_connections)
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout())
        .connect(&database.url)
        .await?;

    if database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");
    }

    Ok((
        Arc::new(PostgresOrderRepository::new(pool.clone())),
        Arc::new(PostgresConfirmationRepository::new(pool)),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
