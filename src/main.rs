//! Therapay backend server
//!
//! Webhook-driven call lifecycle reconciliation and billing for paid
//! audio/video consultations: the platform event ingress, wallet operations,
//! call history, and invite staging.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::env;
use std::sync::Arc;
use therapay_api::{
    configure_calls, configure_notifications, configure_wallet, configure_webhooks,
    configure_withdrawals, health, CallEngine, PlatformIdentityResolver,
};
use therapay_cache::RedisCache;
use therapay_core::config::AppConfig;
use therapay_db::{create_pool, PgUserRepository};
use therapay_platform::PlatformCallControl;
use therapay_services::{BillingReconciler, NotificationStage, WalletService};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Configure API routes
fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Health check
            .route("/health", web::get().to(health))
            // Platform webhook ingress
            .configure(configure_webhooks)
            // Call history and per-call ledger
            .configure(configure_calls)
            // Invite staging for the ringing UX
            .configure(configure_notifications)
            // Top-ups and ledger listings
            .configure(configure_wallet)
            // Therapist payout lifecycle
            .configure(configure_withdrawals),
    );
}

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "therapay={},therapay_api={},therapay_services={},therapay_db={},actix_web=info,sqlx=warn",
            log_level, log_level, log_level, log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Therapay backend v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().expect("Failed to load configuration");

    if !config.platform.enforce_signatures {
        warn!("Webhook signature enforcement is DISABLED; never run production like this");
    }

    info!("Connecting to database...");
    let pool = create_pool(&config.database.url, Some(config.database.max_connections))
        .await
        .expect("Failed to create database pool");

    info!("Connecting to Redis...");
    let cache = RedisCache::new(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");

    // Wire the lifecycle engine: resolver -> planner/applier -> reconciler
    let users = Arc::new(PgUserRepository::new(pool.clone()));
    let resolver = Arc::new(PlatformIdentityResolver::new(
        users.clone(),
        Arc::new(cache),
        config.redis.identity_ttl_secs,
    ));

    let fee_percent =
        Decimal::from_f64(config.billing.platform_fee_percent).unwrap_or_default();
    let reconciler = Arc::new(BillingReconciler::new(pool.clone(), fee_percent));

    let control = PlatformCallControl::new(
        &config.platform.api_base_url,
        &config.platform.api_key,
        config.platform.teardown_timeout_secs,
    )
    .expect("Failed to build platform API client");

    let engine = web::Data::new(CallEngine::new(
        pool.clone(),
        resolver,
        users,
        reconciler,
        Arc::new(control),
    ));

    let min_withdrawal =
        Decimal::from_f64(config.billing.min_withdrawal_amount).unwrap_or(Decimal::ONE);
    let wallet = web::Data::new(WalletService::new(pool.clone(), min_withdrawal));

    let stage = web::Data::new(NotificationStage::new(
        config.billing.invite_ttl_secs as i64,
    ));

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    let app_config = web::Data::new(config);
    let pool_data = web::Data::new(pool);

    let cors_origins = env::var("CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string());

    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                origin
                    .to_str()
                    .map(|o| {
                        cors_origins_inner
                            .split(',')
                            .any(|allowed| allowed.trim() == o)
                    })
                    .unwrap_or(false)
            })
            .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .max_age(3600);

        App::new()
            .app_data(pool_data.clone())
            .app_data(app_config.clone())
            .app_data(engine.clone())
            .app_data(wallet.clone())
            .app_data(stage.clone())
            .wrap(cors)
            .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_routes)
            // Root redirect to health
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await
}
