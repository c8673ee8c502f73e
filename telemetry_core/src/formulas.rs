//! Per-phase electrical formulas, consolidated in one place so the mock
//! generator and validation use identical arithmetic.

/// Rounding epsilon subtracted from summed totals. Matches the behaviour of
/// the upstream meters, which report totals slightly below the phase sum.
pub const ROUNDING_EPSILON: f64 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhasePower {
    pub kw: f64,
    pub kva: f64,
    pub kvar: f64,
}

/// Power triangle for one phase from voltage, current, and power factor.
/// kvar is derived as sqrt(kva^2 - kw^2), so kva >= kw always holds.
pub fn phase_power(voltage_v: f64, current_a: f64, pf: f64) -> PhasePower {
    let kva = voltage_v * current_a / 1000.0;
    let kw = voltage_v * current_a * pf / 1000.0;
    let kvar = (kva * kva - kw * kw).max(0.0).sqrt();
    PhasePower { kw, kva, kvar }
}

/// Three-phase total as reported by the meters: phase sum less the rounding
/// epsilon, floored at zero.
pub fn total(p1: f64, p2: f64, p3: f64) -> f64 {
    (p1 + p2 + p3 - ROUNDING_EPSILON).max(0.0)
}
