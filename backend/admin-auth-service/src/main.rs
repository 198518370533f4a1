/// Admin auth service - main entry point
use actix_cors::Cors;
use actix_middleware::{
    metrics::metrics_handler, AuthGate, Logging, MetricsMiddleware, RedisRevocationStore,
    RevocationStore,
};
use actix_web::{http::header, web, App, HttpServer};
use anyhow::{Context, Result};
use crypto_core::TokenCodec;
use db_session::{connect_once, DbConfig};
use redis_utils::RedisPool;
use std::sync::Arc;
use std::time::Duration;

use admin_auth_service::{
    config::{CorsConfig, RedisConfig},
    directory::{DirectoryProvider, PgDirectoryProvider},
    middleware::RequestDirectoryMiddleware,
    routes,
    services::{AccountService, SessionService},
    telemetry, Config,
};

const SERVICE_NAME: &str = "admin-auth-service";
const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[actix_web::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    telemetry::init_tracing();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        env = %config.app.env,
        "starting {SERVICE_NAME}"
    );
    config.log_insecure_defaults();
    config.ensure_production_safe()?;

    // A host without a working secure RNG must not issue credentials
    crypto_core::self_check().context("cryptographic self-check failed")?;

    let codec = Arc::new(TokenCodec::new(config.jwt.secret.as_bytes(), config.jwt.ttl_seconds));
    tracing::info!(ttl_seconds = codec.ttl_seconds(), "token codec ready");

    let revocations = connect_revocation_store(&config.redis).await;

    let mut db_config = DbConfig::new(SERVICE_NAME, config.database.url.clone());
    db_config.connect_timeout_secs = config.database.connect_timeout_secs;

    if config.database.run_migrations {
        let mut conn = connect_once(&db_config)
            .await
            .context("failed to connect to the database for migrations")?;
        MIGRATOR
            .run(&mut conn)
            .await
            .context("failed to apply database migrations")?;
        tracing::info!("database migrations applied");
    }

    let provider: Arc<dyn DirectoryProvider> = Arc::new(PgDirectoryProvider::new(db_config));
    let gate = AuthGate::new(codec.clone(), revocations.clone())
        .with_whitelist(config.auth.whitelist.clone());
    let sessions = web::Data::new(SessionService::new(codec, revocations));
    let accounts = web::Data::new(AccountService::new());
    let cors_config = config.cors.clone();

    let bind_address = config.bind_address();
    tracing::info!(address = %bind_address, "HTTP server listening");

    HttpServer::new(move || {
        let gate = gate.clone();
        App::new()
            .app_data(sessions.clone())
            .app_data(accounts.clone())
            .wrap(RequestDirectoryMiddleware::new(provider.clone()))
            .wrap(build_cors(&cors_config))
            .wrap(MetricsMiddleware)
            .wrap(Logging)
            .route("/metrics", web::get().to(metrics_handler))
            .configure(|cfg| routes::configure(cfg, gate))
    })
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {bind_address}"))?
    .run()
    .await
    .context("HTTP server terminated with an error")?;

    Ok(())
}

/// Revocation store, or `None` for degraded mode.
async fn connect_revocation_store(config: &RedisConfig) -> Option<Arc<dyn RevocationStore>> {
    let url = config.url.as_deref()?;

    match RedisPool::connect(url, REDIS_CONNECT_TIMEOUT).await {
        Ok(pool) => {
            let store = RedisRevocationStore::new(pool.manager())
                .with_command_timeout(config.command_timeout());
            Some(Arc::new(store))
        }
        Err(e) => {
            tracing::error!(error = %e, "Redis unavailable; running without token revocation");
            None
        }
    }
}

fn build_cors(config: &CorsConfig) -> Cors {
    let cors = if config.allowed_origins.is_empty() {
        Cors::default().allow_any_origin()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(86_400)
}
