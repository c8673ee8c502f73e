//! Derived KPI arithmetic: percent change, net balance, power factor,
//! efficiency.

use serde::Serialize;

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Percent change of `current` against `baseline`.
///
/// A zero baseline is not an error: the result is defined as +100 when the
/// current value is positive and 0 otherwise. That keeps the signal
/// directionally sensible without dividing by zero; it is a presentation
/// policy, not physics.
pub fn percent_change(current: f64, baseline: f64, decimals: u32) -> f64 {
    if baseline == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    round_to((current - baseline) / baseline * 100.0, decimals)
}

#[derive(Clone, Debug, Serialize)]
pub struct NetBalance {
    pub kwh: f64,
    pub label: &'static str,
}

/// Net energy balance over a window: export minus import.
pub fn net_energy_balance(import_kwh: f64, export_kwh: f64) -> NetBalance {
    let kwh = export_kwh - import_kwh;
    NetBalance {
        kwh,
        label: if kwh >= 0.0 { "Net Positive" } else { "Net Negative" },
    }
}

/// Overall power factor as the arithmetic mean of the per-phase factors.
/// This reproduces the meters' simplification; it is not the vector
/// combination.
pub fn power_factor_total(pf1: f64, pf2: f64, pf3: f64) -> f64 {
    (pf1 + pf2 + pf3) / 3.0
}

/// Output as a percentage of rated capacity, clamped to [0, 100].
pub fn efficiency_pct(output: f64, rated_capacity: f64) -> f64 {
    if rated_capacity <= 0.0 {
        return 0.0;
    }
    (output / rated_capacity * 100.0).clamp(0.0, 100.0)
}
