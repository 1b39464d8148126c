use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use storefront_auth::auth::{AuthDependencies, AuthService};
use storefront_auth::clock::SystemClock;
use storefront_auth::configuration::get_configuration;
use storefront_auth::startup::run;
use storefront_auth::telemetry::init_telemetry;

const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let connection_string = configuration.database.connection_string();
    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&connection_string)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
    })?;

    tracing::info!("Database ready");

    let deps = AuthDependencies::postgres(
        pool,
        Arc::new(SystemClock),
        configuration.cache.enabled,
    );
    let auth = AuthService::new(deps, &configuration.token, &configuration.security)
        .map(Arc::new)
        .map_err(|e| {
            tracing::error!("Failed to build authentication service: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Service initialization error")
        })?;

    // Expiry-driven session cleanup
    let cleanup = auth.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = cleanup.cleanup_expired_sessions().await {
                tracing::error!(error = %e, "Session cleanup failed");
            }
        }
    });

    let address = format!("127.0.0.1:{}", configuration.application.port);
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, auth)?;
    server.await
}
