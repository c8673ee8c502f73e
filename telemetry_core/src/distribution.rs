//! Energy-flow distribution for the pie chart: grid import, solar
//! generation, grid export.

use serde::Serialize;

pub const GRID_IMPORT: &str = "Grid Import";
pub const SOLAR: &str = "Solar";
pub const GRID_EXPORT: &str = "Grid Export";

#[derive(Clone, Debug, Serialize)]
pub struct DistributionEntry {
    pub name: &'static str,
    pub value: f64,
}

/// Build the three-entry distribution. The shape is stable: consumers always
/// get exactly these three entries in this order, even when the window total
/// is zero. Negative inputs are floored at zero so shares stay meaningful.
pub fn distribution(grid_import: f64, generation: f64, grid_export: f64) -> Vec<DistributionEntry> {
    vec![
        DistributionEntry {
            name: GRID_IMPORT,
            value: grid_import.max(0.0),
        },
        DistributionEntry {
            name: SOLAR,
            value: generation.max(0.0),
        },
        DistributionEntry {
            name: GRID_EXPORT,
            value: grid_export.max(0.0),
        },
    ]
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn three_entries_in_stable_order() {
        let entries = distribution(12.0, 30.0, 8.0);
        let names: Vec<&str> = entries.iter().map(|e| e.name).collect();
        assert_eq!(names, vec![GRID_IMPORT, SOLAR, GRID_EXPORT]);
    }

    #[test]
    fn values_sum_to_the_window_total() {
        let entries = distribution(12.5, 30.25, 8.25);
        let total: f64 = entries.iter().map(|e| e.value).sum();
        assert_relative_eq!(total, 51.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_total_keeps_all_entries() {
        let entries = distribution(0.0, 0.0, 0.0);
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.value == 0.0));
    }

    #[test]
    fn percentages_cover_the_whole_when_nonzero() {
        let entries = distribution(20.0, 70.0, 10.0);
        let total: f64 = entries.iter().map(|e| e.value).sum();
        let pct_sum: f64 = entries.iter().map(|e| e.value / total * 100.0).sum();
        assert_relative_eq!(pct_sum, 100.0, epsilon = 1e-9);
    }
}
