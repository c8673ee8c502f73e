use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgPoolOptions};
use telemetry_core::{Reading, SourceId, Window};
use tracing::warn;

use crate::config::AppConfig;
use crate::models::ReadingRow;

pub async fn maybe_connect_db(cfg: &AppConfig) -> Result<Option<PgPool>> {
    let Some(url) = cfg.database_url.as_ref() else {
        return Ok(None);
    };
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .context("connecting to DATABASE_URL")?;
    init_db(&pool).await?;
    if cfg.reset_db {
        warn!("RESET_DB is set; truncating readings");
        reset_db(&pool).await?;
    }
    Ok(Some(pool))
}

pub async fn reset_db(pool: &PgPool) -> Result<()> {
    sqlx::query("TRUNCATE TABLE readings")
        .execute(pool)
        .await
        .context("resetting readings table")?;
    Ok(())
}

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            source text NOT NULL,
            ts timestamptz NOT NULL,
            v1 double precision NOT NULL,
            v2 double precision NOT NULL,
            v3 double precision NOT NULL,
            v12 double precision NOT NULL,
            v23 double precision NOT NULL,
            v31 double precision NOT NULL,
            a1 double precision NOT NULL,
            a2 double precision NOT NULL,
            a3 double precision NOT NULL,
            kw1 double precision NOT NULL,
            kw2 double precision NOT NULL,
            kw3 double precision NOT NULL,
            kwt double precision NOT NULL,
            kva1 double precision NOT NULL,
            kva2 double precision NOT NULL,
            kva3 double precision NOT NULL,
            kvat double precision NOT NULL,
            kvar1 double precision NOT NULL,
            kvar2 double precision NOT NULL,
            kvar3 double precision NOT NULL,
            kvart double precision NOT NULL,
            pf1 double precision NOT NULL,
            pf2 double precision NOT NULL,
            pf3 double precision NOT NULL,
            pft double precision NOT NULL,
            hz double precision NOT NULL,
            kwh_import double precision NOT NULL,
            kwh_export double precision NOT NULL,
            kvarh_import double precision NOT NULL,
            kvarh_export double precision NOT NULL
        );
    "#,
    )
    .execute(pool)
    .await
    .context("creating readings table")?;

    try_setup_timescale(pool).await;
    Ok(())
}

async fn try_setup_timescale(pool: &PgPool) {
    if let Err(err) = sqlx::query("CREATE EXTENSION IF NOT EXISTS timescaledb;")
        .execute(pool)
        .await
    {
        warn!("timescaledb extension unavailable: {err}");
        return;
    }

    if let Err(err) = sqlx::query(
        r#"
        SELECT create_hypertable('readings', 'ts', if_not_exists => TRUE);
        "#,
    )
    .execute(pool)
    .await
    {
        warn!("failed to convert readings to hypertable: {err}");
        return;
    }

    if let Err(err) = sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS readings_source_ts_idx
        ON readings (source, ts DESC);
        "#,
    )
    .execute(pool)
    .await
    {
        warn!("failed to create readings index: {err}");
    }
}

pub async fn insert_readings(pool: &PgPool, readings: &[Reading]) -> Result<()> {
    for r in readings {
        sqlx::query(
            r#"
            INSERT INTO readings (
                source, ts,
                v1, v2, v3, v12, v23, v31,
                a1, a2, a3,
                kw1, kw2, kw3, kwt,
                kva1, kva2, kva3, kvat,
                kvar1, kvar2, kvar3, kvart,
                pf1, pf2, pf3, pft, hz,
                kwh_import, kwh_export, kvarh_import, kvarh_export
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,
                      $17,$18,$19,$20,$21,$22,$23,$24,$25,$26,$27,$28,$29,$30,$31,$32)
        "#,
        )
        .bind(r.source.as_str())
        .bind(r.ts)
        .bind(r.v1)
        .bind(r.v2)
        .bind(r.v3)
        .bind(r.v12)
        .bind(r.v23)
        .bind(r.v31)
        .bind(r.a1)
        .bind(r.a2)
        .bind(r.a3)
        .bind(r.kw1)
        .bind(r.kw2)
        .bind(r.kw3)
        .bind(r.kwt)
        .bind(r.kva1)
        .bind(r.kva2)
        .bind(r.kva3)
        .bind(r.kvat)
        .bind(r.kvar1)
        .bind(r.kvar2)
        .bind(r.kvar3)
        .bind(r.kvart)
        .bind(r.pf1)
        .bind(r.pf2)
        .bind(r.pf3)
        .bind(r.pft)
        .bind(r.hz)
        .bind(r.kwh_import)
        .bind(r.kwh_export)
        .bind(r.kvarh_import)
        .bind(r.kvarh_export)
        .execute(pool)
        .await
        .context("inserting reading row")?;
    }
    Ok(())
}

const READING_COLUMNS: &str = r#"
    source, ts,
    v1, v2, v3, v12, v23, v31,
    a1, a2, a3,
    kw1, kw2, kw3, kwt,
    kva1, kva2, kva3, kvat,
    kvar1, kvar2, kvar3, kvart,
    pf1, pf2, pf3, pft, hz,
    kwh_import, kwh_export, kvarh_import, kvarh_export
"#;

/// Readings for one source within the window, ascending by sample time.
pub async fn fetch_readings(
    pool: &PgPool,
    source: SourceId,
    window: Window,
) -> Result<Vec<Reading>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ReadingRow>(&format!(
        r#"
        SELECT {READING_COLUMNS}
        FROM readings
        WHERE source = $1 AND ts >= $2 AND ts <= $3
        ORDER BY ts ASC
        "#
    ))
    .bind(source.as_str())
    .bind(window.start)
    .bind(window.end)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(ReadingRow::into_reading).collect())
}

/// All readings in the window across every source, ascending by sample time.
pub async fn fetch_readings_all(
    pool: &PgPool,
    window: Window,
) -> Result<Vec<Reading>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ReadingRow>(&format!(
        r#"
        SELECT {READING_COLUMNS}
        FROM readings
        WHERE ts >= $1 AND ts <= $2
        ORDER BY ts ASC
        "#
    ))
    .bind(window.start)
    .bind(window.end)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(ReadingRow::into_reading).collect())
}

/// Latest reading for one source, if any.
pub async fn fetch_latest(
    pool: &PgPool,
    source: SourceId,
) -> Result<Option<Reading>, sqlx::Error> {
    let row = sqlx::query_as::<_, ReadingRow>(&format!(
        r#"
        SELECT {READING_COLUMNS}
        FROM readings
        WHERE source = $1
        ORDER BY ts DESC
        LIMIT 1
        "#
    ))
    .bind(source.as_str())
    .fetch_optional(pool)
    .await?;
    Ok(row.and_then(ReadingRow::into_reading))
}

/// Most recent sample time in the whole table, if any.
pub async fn latest_sample_ts(pool: &PgPool) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar("SELECT MAX(ts) FROM readings")
        .fetch_one(pool)
        .await
}
