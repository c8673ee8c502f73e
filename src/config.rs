use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use telemetry_core::SourceId;

/// Service configuration, built once in `main` and passed down explicitly.
/// DATABASE_URL is optional; `None` means run against the in-memory store.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub database_url: Option<String>,
    pub mock_data: bool,
    pub reset_db: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = std::env::var("HTTP_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3001".to_string())
            .parse()
            .context("invalid HTTP_ADDR")?;
        Ok(Self {
            http_addr,
            database_url: std::env::var("DATABASE_URL").ok(),
            mock_data: env_truthy("MOCK_DATA"),
            reset_db: env_truthy("RESET_DB"),
        })
    }
}

fn env_truthy(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.to_lowercase();
            v == "1" || v == "true" || v == "yes" || v == "on"
        })
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    sources: Vec<SourceCfg>,
}

#[derive(Debug, Deserialize)]
struct SourceCfg {
    id: SourceId,
    name: String,
    rated_kw: f64,
}

/// Per-source display names and rated capacities from sources.yaml.
#[derive(Clone, Debug)]
pub struct SourceCatalog {
    entries: HashMap<SourceId, (String, f64)>,
}

impl SourceCatalog {
    /// Load sources.yaml from SOURCES_PATH or common relative locations.
    /// Falls back to built-in defaults when no file is present, since the
    /// source set itself is fixed.
    pub async fn load() -> Result<Self> {
        let candidates = if let Ok(p) = std::env::var("SOURCES_PATH") {
            vec![PathBuf::from(p)]
        } else {
            vec![
                PathBuf::from("sources.yaml"),
                PathBuf::from("../sources.yaml"),
            ]
        };

        for path in candidates {
            if let Ok(raw) = tokio::fs::read_to_string(&path).await {
                tracing::info!("loaded source catalog from {}", path.display());
                let parsed: SourcesFile =
                    serde_yaml::from_str(&raw).context("parsing sources.yaml")?;
                return Ok(Self {
                    entries: parsed
                        .sources
                        .into_iter()
                        .map(|s| (s.id, (s.name, s.rated_kw)))
                        .collect(),
                });
            }
        }

        tracing::warn!("sources.yaml not found; using built-in source catalog");
        Ok(Self::default())
    }

    pub fn name(&self, source: SourceId) -> &str {
        self.entries
            .get(&source)
            .map(|(name, _)| name.as_str())
            .unwrap_or_else(|| source.as_str())
    }

    pub fn rated_kw(&self, source: SourceId) -> f64 {
        self.entries
            .get(&source)
            .map(|(_, rated)| *rated)
            .unwrap_or(0.0)
    }
}

impl Default for SourceCatalog {
    fn default() -> Self {
        let defaults = [
            (SourceId::Grid1, "Grid Meter A", 500.0),
            (SourceId::Grid2, "Grid Meter B", 500.0),
            (SourceId::Gen1, "Generator 1", 250.0),
            (SourceId::Gen2, "Generator 2", 250.0),
            (SourceId::Inv1, "Inverter 1", 120.0),
            (SourceId::Inv2, "Inverter 2", 120.0),
        ];
        Self {
            entries: defaults
                .into_iter()
                .map(|(id, name, rated)| (id, (name.to_string(), rated)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_covers_every_source() {
        let catalog = SourceCatalog::default();
        for source in SourceId::ALL {
            assert!(catalog.rated_kw(source) > 0.0, "no rating for {source}");
            assert!(!catalog.name(source).is_empty());
        }
    }

    #[test]
    fn sources_file_parses() {
        let raw = r#"
sources:
  - id: grid-1
    name: Main Grid
    rated_kw: 400.0
  - id: inv-1
    name: Roof Inverter
    rated_kw: 80.0
"#;
        let parsed: SourcesFile = serde_yaml::from_str(raw).unwrap();
        assert_eq!(parsed.sources.len(), 2);
        assert_eq!(parsed.sources[0].id, SourceId::Grid1);
        assert_eq!(parsed.sources[1].rated_kw, 80.0);
    }
}
