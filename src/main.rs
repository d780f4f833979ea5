use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{routing::get, Router};
use http::HeaderValue;
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod i18n;
mod middleware;
mod routes;
mod services;

use config::Config;
use i18n::I18n;
use services::{
    content::ContentService,
    generation::{GenerationClient, TextGenerator},
    init,
    schedule::{ScheduleStore, SqliteKeyValueStore},
    session::SessionService,
};

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub http: reqwest::Client,
    pub i18n: I18n,
    pub sessions: SessionService,
    pub generator: Arc<dyn TextGenerator>,
    pub content: ContentService,
    pub schedule: ScheduleStore,
}

impl AppState {
    pub fn new(
        db: sqlx::SqlitePool,
        config: Config,
        http: reqwest::Client,
        generator: Arc<dyn TextGenerator>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            i18n: I18n::new()?,
            sessions: SessionService::new(&config.auth),
            content: ContentService::new(
                generator.clone(),
                Duration::from_secs(config.server.content_session_idle_minutes * 60),
            ),
            schedule: ScheduleStore::new(Arc::new(SqliteKeyValueStore::new(db.clone()))),
            generator,
            db,
            config,
            http,
        })
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hypecat=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting HypeCat service");

    let pool = init::init_db(&config).await?;
    let http = init::build_http_client(&config)?;
    let generator: Arc<dyn TextGenerator> =
        Arc::new(GenerationClient::from_config(&config, http.clone()));

    let app_state = Arc::new(AppState::new(pool, config.clone(), http, generator)?);

    let thread_shutdown = Arc::new(AtomicBool::new(false));

    // Per-IP limits on the endpoints that cost money or touch third parties
    let generate_gov_conf = init::build_governor(
        "generate",
        config.rate_limit.generate_per_second,
        config.rate_limit.generate_burst,
    )?;
    let auth_gov_conf = init::build_governor(
        "social-auth",
        config.rate_limit.auth_per_second,
        config.rate_limit.auth_burst,
    )?;
    let cleaners = vec![
        init::spawn_limiter_cleanup("generate", &generate_gov_conf, thread_shutdown.clone()),
        init::spawn_limiter_cleanup("social-auth", &auth_gov_conf, thread_shutdown.clone()),
    ];

    let frontend_origin = config
        .server
        .frontend_url
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("Invalid FRONTEND_URL for CORS: {}", e))?;

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest(
            "/api/generate",
            routes::generate::router().layer(GovernorLayer {
                config: generate_gov_conf.clone(),
            }),
        )
        .nest("/api/content", routes::content::router())
        .nest(
            "/api/social-auth",
            routes::social_auth::router().layer(GovernorLayer {
                config: auth_gov_conf.clone(),
            }),
        )
        .nest("/api/social-publish", routes::publish::router())
        .nest("/api/calendar", routes::calendar::router())
        .nest("/api/stripe", routes::billing::router())
        .with_state(app_state.clone())
        .layer(axum::middleware::from_fn(middleware::csp::csp_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(frontend_origin)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                ])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::header::AUTHORIZATION,
                    http::header::ACCEPT,
                    http::header::ACCEPT_LANGUAGE,
                ])
                .allow_credentials(true),
        );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let thread_shutdown_clone = thread_shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, draining connections");
        thread_shutdown_clone.store(true, Ordering::SeqCst);
    })
    .await?;

    thread_shutdown.store(true, Ordering::SeqCst);
    for handle in cleaners {
        if let Err(e) = handle.join() {
            tracing::warn!("Rate limiter cleanup thread join failed: {:?}", e);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to bind SIGTERM: {}", e);
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
