//! Dashboard backend for a mixed grid/generator/inverter solar site.
//! - Serves KPIs, charts, distribution, grid/generator detail, alerts,
//!   forecast, history, and weather as JSON under /api.
//! - Optionally connects to Postgres/Timescale for readings; without
//!   DATABASE_URL it runs against an in-memory store.
//! - MOCK_DATA seeds deterministic synthetic readings at startup.
//! - Env vars: HTTP_ADDR, DATABASE_URL (optional), SOURCES_PATH (optional),
//!   MOCK_DATA (optional), RESET_DB (optional).

use std::sync::Arc;

use anyhow::Result;
use axum::{Router, routing::get};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod http;
mod mock;
mod models;
mod reader;

use crate::config::{AppConfig, SourceCatalog};
use crate::db::maybe_connect_db;
use crate::http::{
    energy_chart, energy_distribution, energy_forecast, energy_history_daily,
    energy_history_monthly, energy_history_yearly, generator_performance,
    generator_performance_hourly, generator_temperature, grid_status, health, list_alerts,
    list_kpis, weather_forecast, weather_now, weather_solar,
};
use crate::reader::TelemetryStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: TelemetryStore,
    pub(crate) catalog: Arc<SourceCatalog>,
    // Kept separately from the store for the health probe.
    pub(crate) db: Option<PgPool>,
}

/// How far back the mock seeder fills history. Long enough that the daily and
/// monthly history endpoints have something to show.
const MOCK_HISTORY_DAYS: i64 = 35;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = AppConfig::from_env()?;
    let catalog = SourceCatalog::load().await?;
    let db = maybe_connect_db(&cfg).await?;
    let store = TelemetryStore::new(db.clone());

    if cfg.mock_data {
        seed_mock_data(&store, db.as_ref()).await?;
    }

    let state = AppState {
        store,
        catalog: Arc::new(catalog),
        db,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/kpis", get(list_kpis))
        .route("/api/energy/chart", get(energy_chart))
        .route("/api/energy/distribution", get(energy_distribution))
        .route("/api/energy/forecast", get(energy_forecast))
        .route("/api/energy/history/daily", get(energy_history_daily))
        .route("/api/energy/history/monthly", get(energy_history_monthly))
        .route("/api/energy/history/yearly", get(energy_history_yearly))
        .route("/api/grid/status", get(grid_status))
        .route("/api/generator/performance", get(generator_performance))
        .route(
            "/api/generator/performance/hourly",
            get(generator_performance_hourly),
        )
        .route("/api/generator/temperature", get(generator_temperature))
        .route("/api/alerts", get(list_alerts))
        .route("/api/weather", get(weather_now))
        .route("/api/weather/forecast", get(weather_forecast))
        .route("/api/weather/solar", get(weather_solar))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let headers = req.headers();
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        path = %req.uri().path(),
                        user_agent = ?headers.get(axum::http::header::USER_AGENT),
                        x_request_id = ?headers.get("x-request-id"),
                    )
                })
                .on_request(|req: &axum::http::Request<_>, _span: &tracing::Span| {
                    tracing::info!(
                        "incoming request method={} path={}",
                        req.method(),
                        req.uri().path()
                    );
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        tracing::info!(
                            parent: span,
                            status = %res.status(),
                            latency_ms = %latency.as_millis(),
                            "response sent"
                        );
                    },
                )
                .on_failure(
                    |err: tower_http::classify::ServerErrorsFailureClass,
                     _latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::error!("request failed: {err}");
                    },
                ),
        );

    tracing::info!("dashboard API on http://{}", cfg.http_addr);
    axum::serve(tokio::net::TcpListener::bind(cfg.http_addr).await?, app).await?;
    Ok(())
}

/// Seed synthetic readings. Against Postgres this is skipped when the table
/// already holds recent samples, so restarts do not duplicate history.
async fn seed_mock_data(store: &TelemetryStore, db: Option<&PgPool>) -> Result<()> {
    let now = Utc::now();
    if let Some(db) = db {
        if let Some(ts) = db::latest_sample_ts(db).await? {
            if now - ts < Duration::hours(1) {
                tracing::info!("readings table is current (latest {ts}); skipping mock seed");
                return Ok(());
            }
        }
    }
    tracing::info!("seeding {MOCK_HISTORY_DAYS} days of mock readings");
    let readings = mock::generate_history(now, Duration::days(MOCK_HISTORY_DAYS));
    store
        .seed(readings)
        .await
        .map_err(|err| anyhow::anyhow!("seeding mock readings: {err}"))?;
    Ok(())
}
