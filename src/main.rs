mod config;
mod db;
mod models;
mod responses;
mod routes;
mod services;
mod state;

use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::{
    http::HeaderName,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use config::Config;
use db::postgres_plan_change_repository::PostgresPlanChangeRepository;
use db::postgres_recommendation_log_repository::PostgresRecommendationLogRepository;
use responses::JsonResponse;
use routes::{admin, billing, pricing};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::db::plan_change_repository::PlanChangeRepository;
use crate::db::recommendation_log_repository::RecommendationLogRepository;
use crate::services::billing::PaymentEventProcessor;
use crate::services::pricing::{HttpCompletionClient, RecommendationGateway};
use crate::services::smtp_mailer::SmtpMailer;
use crate::state::AppState;

#[cfg(feature = "tls")]
use axum_server::tls_rustls::RustlsConfig;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let rate_limit_ms: u64 = std::env::var("RATE_LIMITER_MILLISECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        // Default: 200ms/token (~5 req/sec)
        .unwrap_or(200);
    let rate_limit_burst: u32 = std::env::var("RATE_LIMITER_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        // Default: allow short bursts during client polling
        .unwrap_or(20);
    let global_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit_ms)
            .burst_size(rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    // Background task to clean up old client IPs in the limiter map
    let governor_limiter = global_governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    let rate_limit_pricing_s: u64 = std::env::var("RATE_LIMITER_PRICING_SECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(1);
    let rate_limit_pricing_burst: u32 = std::env::var("RATE_LIMITER_PRICING_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(10);
    // Stricter limiter for the recommendation endpoint: it is the only
    // user-triggerable call that can reach the completion API.
    let pricing_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(rate_limit_pricing_s)
            .burst_size(rate_limit_pricing_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    let config = Config::from_env();

    if std::env::var("PAYMENT_WEBHOOK_SECRET")
        .map(|s| s.trim().is_empty())
        .unwrap_or(true)
    {
        warn!("PAYMENT_WEBHOOK_SECRET is not set; inbound webhook signatures will not be verified");
    }
    if !config.pricing.is_configured() {
        warn!("PRICING_API_URL is not set; every recommendation will serve the fallback price");
    }

    let pg_pool = establish_connection(&config.database_url).await;
    let ledger = Arc::new(PostgresPlanChangeRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn PlanChangeRepository>;

    let recommendation_log = Arc::new(PostgresRecommendationLogRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn RecommendationLogRepository>;

    // Initialize mailer
    let mailer = Arc::new(SmtpMailer::new().expect("Failed to initialize mailer"));

    let completion_client = Arc::new(HttpCompletionClient::from_settings(&config.pricing));
    let pricing_gateway = Arc::new(RecommendationGateway::new(
        completion_client,
        recommendation_log,
        config.pricing.fallback_price,
        config.pricing.cache_ttl,
    ));

    let processor = Arc::new(PaymentEventProcessor::new(ledger.clone(), mailer));

    let state = AppState {
        ledger,
        processor,
        pricing: pricing_gateway,
    };

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static("x-webhook-signature"),
            HeaderName::from_static("x-ops-token"),
        ])
        .allow_credentials(true);

    // Provider-facing webhook; signature-checked in the handler.
    let billing_routes = Router::new().route("/webhook", post(billing::webhook));

    let pricing_routes = Router::new()
        .route("/recommend", post(pricing::recommend))
        .layer(GovernorLayer {
            config: pricing_governor_conf.clone(),
        });

    let admin_routes = Router::new()
        .route("/plan-changes", get(admin::list_plan_changes))
        .route("/plan-changes/export", get(admin::export_plan_changes));

    let app = Router::new()
        .route("/", get(root))
        .nest("/api/billing", billing_routes)
        .nest("/api/pricing", pricing_routes)
        .nest("/api/admin", admin_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: global_governor_conf.clone(),
        })
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));

    #[cfg(feature = "tls")]
    {
        // TLS: Only run this block when `--features tls` is used
        let tls_config = RustlsConfig::from_pem_file(
            std::env::var("DEV_CERT_LOCATION").unwrap(),
            std::env::var("DEV_KEY_LOCATION").unwrap(),
        )
        .await
        .expect("Failed to load TLS certs");

        println!("Running with TLS at https://{}", addr);
        let _ = axum_server::bind_rustls(addr, tls_config)
            .serve(make_service)
            .await;

        return; // Skip the fallback if TLS was used
    }

    let listener = TcpListener::bind(addr).await.unwrap();
    println!("Running without TLS at http://{}", addr);
    axum::serve(listener, make_service).await.unwrap();
}

/// A simple root route.
async fn root() -> Response {
    JsonResponse::success("Hello, Tierly!").into_response()
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> PgPool {
    let pool = PgPool::connect(database_url)
        .await
        .expect("Failed to connect to the database");

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .expect("Failed to verify database connection");

    info!("✅ Successfully connected to the database");
    pool
}
