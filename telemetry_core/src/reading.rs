use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed set of metered sources feeding the dashboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceId {
    #[serde(rename = "grid-1")]
    Grid1,
    #[serde(rename = "grid-2")]
    Grid2,
    #[serde(rename = "gen-1")]
    Gen1,
    #[serde(rename = "gen-2")]
    Gen2,
    #[serde(rename = "inv-1")]
    Inv1,
    #[serde(rename = "inv-2")]
    Inv2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Grid,
    Generator,
    Inverter,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown source identifier `{0}`")]
pub struct UnknownSource(pub String);

impl SourceId {
    pub const ALL: [SourceId; 6] = [
        SourceId::Grid1,
        SourceId::Grid2,
        SourceId::Gen1,
        SourceId::Gen2,
        SourceId::Inv1,
        SourceId::Inv2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceId::Grid1 => "grid-1",
            SourceId::Grid2 => "grid-2",
            SourceId::Gen1 => "gen-1",
            SourceId::Gen2 => "gen-2",
            SourceId::Inv1 => "inv-1",
            SourceId::Inv2 => "inv-2",
        }
    }

    pub fn kind(self) -> SourceKind {
        match self {
            SourceId::Grid1 | SourceId::Grid2 => SourceKind::Grid,
            SourceId::Gen1 | SourceId::Gen2 => SourceKind::Generator,
            SourceId::Inv1 | SourceId::Inv2 => SourceKind::Inverter,
        }
    }

    pub fn of_kind(kind: SourceKind) -> impl Iterator<Item = SourceId> {
        Self::ALL.into_iter().filter(move |s| s.kind() == kind)
    }
}

impl FromStr for SourceId {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grid-1" => Ok(SourceId::Grid1),
            "grid-2" => Ok(SourceId::Grid2),
            "gen-1" => Ok(SourceId::Gen1),
            "gen-2" => Ok(SourceId::Gen2),
            "inv-1" => Ok(SourceId::Inv1),
            "inv-2" => Ok(SourceId::Inv2),
            other => Err(UnknownSource(other.to_string())),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw per-phase electrical reading. Immutable once written; the
/// kwh/kvarh counters are cumulative meter registers, not per-sample energy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reading {
    pub source: SourceId,
    pub ts: DateTime<Utc>,
    // Phase and line-line voltages (V).
    pub v1: f64,
    pub v2: f64,
    pub v3: f64,
    pub v12: f64,
    pub v23: f64,
    pub v31: f64,
    // Phase currents (A).
    pub a1: f64,
    pub a2: f64,
    pub a3: f64,
    // Real power (kW).
    pub kw1: f64,
    pub kw2: f64,
    pub kw3: f64,
    pub kwt: f64,
    // Apparent power (kVA).
    pub kva1: f64,
    pub kva2: f64,
    pub kva3: f64,
    pub kvat: f64,
    // Reactive power (kVAR).
    pub kvar1: f64,
    pub kvar2: f64,
    pub kvar3: f64,
    pub kvart: f64,
    // Power factor per phase and overall.
    pub pf1: f64,
    pub pf2: f64,
    pub pf3: f64,
    pub pft: f64,
    pub hz: f64,
    // Cumulative energy registers.
    pub kwh_import: f64,
    pub kwh_export: f64,
    pub kvarh_import: f64,
    pub kvarh_export: f64,
}
