//! # lotctl: Campus Parking Control Layer
//!
//! `lotctl` is the reservation and capacity allocation engine for a campus
//! parking system. It tracks two kinds of capacity - discrete units (named,
//! individually reservable spots) and pooled capacity (counter-tracked
//! sections) - and drives reservations through their lifecycle from
//! allocation to scan-validated sessions to billing.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and uses PostgreSQL for all persistence. Correctness under
//! concurrency comes from the database, not from in-process locks: every
//! allocation and lifecycle transition is a guarded `UPDATE` whose row count
//! decides between success and a contention error, executed inside a single
//! transaction with the reservation write. Two concurrent requests for the
//! last spot cannot both win because only one of their guarded writes
//! matches.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) exposes the management surface at `/api/v1/*`:
//! reservation allocation and cancellation, scan-driven session start/end,
//! capacity provisioning and listing, and the requester/vehicle/balance
//! directory.
//!
//! The **engine** ([`engine`]) owns the business semantics: the allocator
//! (eligibility checks, unit claims, pool counter mutations, slot label
//! synthesis), the lifecycle state machine, session token validation,
//! billing and penalty settlement, and the grace-period sweeper that
//! invalidates reservations whose holder never showed up.
//!
//! The **database layer** ([`db`]) uses the repository pattern; each entity
//! has a repository struct executing its queries over a borrowed connection,
//! so engine code can compose several repositories inside one transaction.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use lotctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = lotctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     lotctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod events;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::cache::CapacityCache;
use crate::engine::{Engine, sweeper::GraceSweeper};
use crate::events::Publisher;
use crate::openapi::ApiDoc;

pub use types::{PoolId, RequesterId, ReservationId, UnitId, VehicleId};

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub publisher: Publisher,
    pub cache: CapacityCache,
}

impl AppState {
    /// Engine handle over this state's pool, publisher, and cache.
    pub fn engine(&self) -> Engine {
        Engine::new(self.db.clone(), self.publisher.clone(), self.cache.clone())
    }
}

/// Get the lotctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allow_origin = if config.cors_allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors_allowed_origins {
            origins.push(origin.parse::<HeaderValue>()?);
        }
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new().allow_origin(allow_origin))
}

/// Build the main application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        // Reservation allocation and lifecycle
        .route("/reservations/unit", post(api::handlers::reservations::create_unit_reservation))
        .route("/reservations/pool", post(api::handlers::reservations::create_pool_reservation))
        .route(
            "/reservations/pool/attended",
            post(api::handlers::reservations::create_attended_reservation),
        )
        .route("/reservations/{id}", get(api::handlers::reservations::get_reservation))
        .route("/reservations/{id}/cancel", post(api::handlers::reservations::cancel_reservation))
        // Scan-driven sessions
        .route("/sessions/start", post(api::handlers::sessions::start_session))
        .route("/sessions/end", post(api::handlers::sessions::end_session))
        // Capacity provisioning and listing
        .route("/capacity", get(api::handlers::capacity::get_capacity))
        .route("/units", post(api::handlers::capacity::create_unit))
        .route("/pools", post(api::handlers::capacity::create_pool))
        // Directory
        .route("/requesters", post(api::handlers::directory::create_requester))
        .route("/vehicles", post(api::handlers::directory::create_vehicle))
        .route("/requesters/{id}/balance", post(api::handlers::directory::grant_balance))
        .route("/requesters/{id}/balance", get(api::handlers::directory::get_balance))
        .with_state(state.clone());

    let cors_layer = create_cors_layer(&state.config)?;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Container for background services and their lifecycle management.
///
/// Currently this is the grace-period sweeper. When dropped, the `drop_guard`
/// cancels the shutdown token, signaling the tasks to stop.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: tokio_util::sync::CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Setup background services (grace-period sweeper)
fn setup_background_services(engine: Engine, config: &Config, shutdown_token: tokio_util::sync::CancellationToken) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    let sweeper = GraceSweeper::new(engine, config.sweeper.interval, config.sweeper.grace_period);
    let sweeper_shutdown = shutdown_token.clone();
    let handle = tokio::spawn(async move {
        sweeper.run(sweeper_shutdown).await;
    });
    background_tasks.push(handle);

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs
///    migrations, and starts background services
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts
///    handling requests
/// 3. **Shutdown**: on the shutdown signal, gracefully stops all services
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await?;
        migrator().run(&pool).await?;

        Self::new_with_pool(config, pool).await
    }

    /// Create an application over an existing pool (migrations already run).
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let publisher = Publisher::default();
        let cache = CapacityCache::new(config.cache.capacity_ttl);

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .publisher(publisher)
            .cache(cache)
            .build();

        let shutdown_token = tokio_util::sync::CancellationToken::new();
        let bg_services = setup_background_services(app_state.engine(), &config, shutdown_token);

        let router = build_router(app_state)?;

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("lotctl listening on http://{bind_addr}");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Shutdown background services and wait for tasks to complete
        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
