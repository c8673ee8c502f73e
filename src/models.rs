use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use telemetry_core::{DistributionEntry, Reading, SourceId};
use uuid::Uuid;

/// Raw reading as stored in Postgres. `source` stays text in the table; rows
/// with an identifier outside the fixed catalog are dropped with a warning.
#[derive(FromRow)]
pub struct ReadingRow {
    pub source: String,
    pub ts: DateTime<Utc>,
    pub v1: f64,
    pub v2: f64,
    pub v3: f64,
    pub v12: f64,
    pub v23: f64,
    pub v31: f64,
    pub a1: f64,
    pub a2: f64,
    pub a3: f64,
    pub kw1: f64,
    pub kw2: f64,
    pub kw3: f64,
    pub kwt: f64,
    pub kva1: f64,
    pub kva2: f64,
    pub kva3: f64,
    pub kvat: f64,
    pub kvar1: f64,
    pub kvar2: f64,
    pub kvar3: f64,
    pub kvart: f64,
    pub pf1: f64,
    pub pf2: f64,
    pub pf3: f64,
    pub pft: f64,
    pub hz: f64,
    pub kwh_import: f64,
    pub kwh_export: f64,
    pub kvarh_import: f64,
    pub kvarh_export: f64,
}

impl ReadingRow {
    pub fn into_reading(self) -> Option<Reading> {
        let source: SourceId = match self.source.parse() {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!("skipping reading row: {err}");
                return None;
            }
        };
        Some(Reading {
            source,
            ts: self.ts,
            v1: self.v1,
            v2: self.v2,
            v3: self.v3,
            v12: self.v12,
            v23: self.v23,
            v31: self.v31,
            a1: self.a1,
            a2: self.a2,
            a3: self.a3,
            kw1: self.kw1,
            kw2: self.kw2,
            kw3: self.kw3,
            kwt: self.kwt,
            kva1: self.kva1,
            kva2: self.kva2,
            kva3: self.kva3,
            kvat: self.kvat,
            kvar1: self.kvar1,
            kvar2: self.kvar2,
            kvar3: self.kvar3,
            kvart: self.kvart,
            pf1: self.pf1,
            pf2: self.pf2,
            pf3: self.pf3,
            pft: self.pft,
            hz: self.hz,
            kwh_import: self.kwh_import,
            kwh_export: self.kwh_export,
            kvarh_import: self.kvarh_import,
            kvarh_export: self.kvarh_export,
        })
    }
}

/// One dashboard KPI tile, tagged by category so consumers can match
/// exhaustively instead of sniffing loose JSON.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Kpi {
    Power {
        title: String,
        value: String,
        change_pct: f64,
    },
    Energy {
        title: String,
        value: String,
        change_pct: f64,
    },
    Grid {
        title: String,
        value: String,
        change_pct: f64,
    },
    Co2 {
        title: String,
        value: String,
        change_pct: f64,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct ChartPoint {
    pub time: DateTime<Utc>,
    pub production: f64,
    pub consumption: f64,
    pub grid: f64,
}

#[derive(Serialize)]
pub struct DistributionResponse {
    pub entries: Vec<DistributionEntry>,
    pub total: f64,
}

#[derive(Serialize)]
pub struct GridChartPoint {
    pub time: DateTime<Utc>,
    pub import_kwh: f64,
    pub export_kwh: f64,
    pub net_kwh: f64,
}

#[derive(Serialize)]
pub struct GridStatusView {
    pub online: bool,
    pub status: String,
    pub voltage_v: f64,
    pub frequency_hz: f64,
    pub power_factor: f64,
    pub kwt: f64,
    pub kwh_import: f64,
    pub kwh_export: f64,
    pub net_label: String,
    #[serde(rename = "chartData")]
    pub chart_data: Vec<GridChartPoint>,
}

#[derive(Debug, Serialize)]
pub struct GeneratorPerformanceView {
    pub source: SourceId,
    pub name: String,
    pub online: bool,
    pub kwt: f64,
    pub rated_kw: f64,
    pub efficiency_pct: f64,
    pub power_factor: f64,
    pub frequency_hz: f64,
}

#[derive(Serialize)]
pub struct GeneratorHourlyPoint {
    pub time: DateTime<Utc>,
    pub kwt: f64,
    pub avg_kw: f64,
    pub efficiency_pct: f64,
}

#[derive(Debug, Serialize)]
pub struct GeneratorTemperatureView {
    pub source: SourceId,
    pub name: String,
    // Estimated from load; the meters carry no temperature sensor.
    pub estimated_c: f64,
    pub load_pct: f64,
}

#[derive(Serialize)]
pub struct AlertView {
    pub id: Uuid,
    pub source: SourceId,
    pub severity: &'static str,
    pub message: String,
    pub ts: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ForecastPoint {
    pub time: DateTime<Utc>,
    pub production: f64,
}

#[derive(Debug, Serialize)]
pub struct HistoryPoint {
    pub period: DateTime<Utc>,
    pub production: f64,
    pub kwh_import: f64,
    pub kwh_export: f64,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db: &'static str,
}
