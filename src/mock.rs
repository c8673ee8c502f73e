//! Deterministic synthetic data for mock-data mode: meter readings shaped by
//! a daily solar curve, plus the weather payloads (the deployment has no
//! weather upstream, so these are generated, not fetched).

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use telemetry_core::formulas::{self, PhasePower};
use telemetry_core::{Reading, SourceId, SourceKind};

const SAMPLE_INTERVAL_MIN: i64 = 15;
const NOMINAL_V: f64 = 230.0;
const NOMINAL_HZ: f64 = 50.0;

// Rated capacities used by the generator profile. Kept in sync with the
// default source catalog.
fn rated_kw(source: SourceId) -> f64 {
    match source.kind() {
        SourceKind::Grid => 500.0,
        SourceKind::Generator => 250.0,
        SourceKind::Inverter => 120.0,
    }
}

/// Solar output fraction for an hour of day: zero at night, peaking at noon.
fn solar_fraction(hour: f64) -> f64 {
    if !(6.0..=18.0).contains(&hour) {
        return 0.0;
    }
    (std::f64::consts::PI * (hour - 6.0) / 12.0).sin().max(0.0)
}

/// Site demand in kW for an hour of day: overnight base with a daytime hump.
fn demand_kw(hour: f64) -> f64 {
    150.0 + 120.0 * (std::f64::consts::PI * (hour - 7.0) / 13.0).sin().max(0.0)
}

#[derive(Default, Clone, Copy)]
struct Registers {
    kwh_import: f64,
    kwh_export: f64,
    kvarh_import: f64,
    kvarh_export: f64,
}

/// Generate readings for all sources at a fixed cadence over
/// `[now - span, now]`. Seeded, so repeated runs produce identical data.
pub fn generate_history(now: DateTime<Utc>, span: Duration) -> Vec<Reading> {
    let mut rng = StdRng::seed_from_u64(0x50_1a_12);
    let mut registers: [Registers; 6] = Default::default();
    let mut readings = Vec::new();

    let steps = span.num_minutes() / SAMPLE_INTERVAL_MIN;
    let dt_hours = SAMPLE_INTERVAL_MIN as f64 / 60.0;
    for step in 0..=steps {
        let ts = now - span + Duration::minutes(step * SAMPLE_INTERVAL_MIN);
        let hour = ts.hour() as f64 + ts.minute() as f64 / 60.0;

        let solar = solar_fraction(hour);
        let generation: f64 = SourceId::of_kind(SourceKind::Inverter)
            .map(|s| solar * rated_kw(s))
            .sum::<f64>()
            + SourceId::of_kind(SourceKind::Generator)
                .map(|s| generator_kw(s, solar))
                .sum::<f64>();
        let net_kw = demand_kw(hour) - generation; // positive = importing

        for (idx, source) in SourceId::ALL.into_iter().enumerate() {
            let kwt = match source.kind() {
                SourceKind::Inverter => solar * rated_kw(source),
                SourceKind::Generator => generator_kw(source, solar),
                // Split the site balance across the two grid meters.
                SourceKind::Grid => net_kw.abs() / 2.0,
            };
            let reading = sample(source, ts, kwt, net_kw, dt_hours, &mut registers[idx], &mut rng);
            readings.push(reading);
        }
    }
    readings
}

fn generator_kw(source: SourceId, solar: f64) -> f64 {
    // Generators carry the site when solar is weak, otherwise idle.
    if solar < 0.2 { 0.6 * rated_kw(source) } else { 0.05 * rated_kw(source) }
}

fn sample(
    source: SourceId,
    ts: DateTime<Utc>,
    kwt_target: f64,
    net_kw: f64,
    dt_hours: f64,
    registers: &mut Registers,
    rng: &mut StdRng,
) -> Reading {
    let pf = (0.92f64 + rng.gen_range(-0.03..0.03)).clamp(0.0, 1.0);
    let hz = NOMINAL_HZ + rng.gen_range(-0.05..0.05);
    let volts = [
        NOMINAL_V + rng.gen_range(-2.0..2.0),
        NOMINAL_V + rng.gen_range(-2.0..2.0),
        NOMINAL_V + rng.gen_range(-2.0..2.0),
    ];

    // Work backwards from the per-phase kW target to a current, then run the
    // shared power-triangle formulas so kva >= kw holds by construction.
    let kw_per_phase = kwt_target.max(0.0) / 3.0;
    let mut phases: [PhasePower; 3] = [PhasePower { kw: 0.0, kva: 0.0, kvar: 0.0 }; 3];
    let mut amps = [0.0f64; 3];
    for i in 0..3 {
        let a = if pf > 0.0 { kw_per_phase * 1000.0 / (volts[i] * pf) } else { 0.0 };
        amps[i] = a;
        phases[i] = formulas::phase_power(volts[i], a, pf);
    }

    // Advance the cumulative registers.
    match source.kind() {
        SourceKind::Grid => {
            // Each grid meter sees half of the site balance.
            let share = net_kw / 2.0;
            registers.kwh_import += share.max(0.0) * dt_hours;
            registers.kwh_export += (-share).max(0.0) * dt_hours;
            let kvart = formulas::total(phases[0].kvar, phases[1].kvar, phases[2].kvar);
            if share >= 0.0 {
                registers.kvarh_import += kvart * dt_hours;
            } else {
                registers.kvarh_export += kvart * dt_hours;
            }
        }
        SourceKind::Inverter | SourceKind::Generator => {
            let kwt = formulas::total(phases[0].kw, phases[1].kw, phases[2].kw);
            registers.kwh_export += kwt * dt_hours;
            // Standby draw keeps the import register moving realistically.
            registers.kwh_import += 0.02 * dt_hours;
            registers.kvarh_export +=
                formulas::total(phases[0].kvar, phases[1].kvar, phases[2].kvar) * dt_hours;
        }
    }

    Reading {
        source,
        ts,
        v1: volts[0],
        v2: volts[1],
        v3: volts[2],
        v12: volts[0] * 3f64.sqrt(),
        v23: volts[1] * 3f64.sqrt(),
        v31: volts[2] * 3f64.sqrt(),
        a1: amps[0],
        a2: amps[1],
        a3: amps[2],
        kw1: phases[0].kw,
        kw2: phases[1].kw,
        kw3: phases[2].kw,
        kwt: formulas::total(phases[0].kw, phases[1].kw, phases[2].kw),
        kva1: phases[0].kva,
        kva2: phases[1].kva,
        kva3: phases[2].kva,
        kvat: formulas::total(phases[0].kva, phases[1].kva, phases[2].kva),
        kvar1: phases[0].kvar,
        kvar2: phases[1].kvar,
        kvar3: phases[2].kvar,
        kvart: formulas::total(phases[0].kvar, phases[1].kvar, phases[2].kvar),
        pf1: pf,
        pf2: pf,
        pf3: pf,
        pft: pf,
        hz,
        kwh_import: registers.kwh_import,
        kwh_export: registers.kwh_export,
        kvarh_import: registers.kvarh_import,
        kvarh_export: registers.kvarh_export,
    }
}

#[derive(Debug, Serialize)]
pub struct WeatherView {
    pub ts: DateTime<Utc>,
    pub temperature_c: f64,
    pub cloud_cover_pct: f64,
    pub wind_m_s: f64,
    pub humidity_pct: f64,
    pub condition: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SolarWeatherView {
    pub ts: DateTime<Utc>,
    pub irradiance_w_m2: f64,
    pub uv_index: f64,
    pub cloud_cover_pct: f64,
    pub sun_hours_today: f64,
}

fn day_rng(ts: DateTime<Utc>) -> StdRng {
    // Stable per day so the "weather" does not flicker between requests.
    StdRng::seed_from_u64(ts.date_naive().num_days_from_ce() as u64)
}

pub fn weather_at(ts: DateTime<Utc>) -> WeatherView {
    let mut rng = day_rng(ts);
    let base_temp: f64 = rng.gen_range(12.0..24.0);
    let cloud: f64 = rng.gen_range(0.0..80.0);
    let hour = ts.hour() as f64;
    let temperature_c = base_temp + 6.0 * (std::f64::consts::PI * (hour - 6.0) / 12.0).sin().max(0.0);
    WeatherView {
        ts,
        temperature_c,
        cloud_cover_pct: cloud,
        wind_m_s: rng.gen_range(0.5..9.0),
        humidity_pct: rng.gen_range(35.0..85.0),
        condition: if cloud < 20.0 {
            "clear"
        } else if cloud < 55.0 {
            "partly-cloudy"
        } else {
            "overcast"
        },
    }
}

pub fn weather_forecast(now: DateTime<Utc>) -> Vec<WeatherView> {
    (1..=24)
        .map(|h| weather_at(now + Duration::hours(h)))
        .collect()
}

pub fn solar_weather(now: DateTime<Utc>) -> SolarWeatherView {
    let weather = weather_at(now);
    let hour = now.hour() as f64 + now.minute() as f64 / 60.0;
    let clear_sky = 1000.0 * solar_fraction(hour);
    let attenuation = 1.0 - weather.cloud_cover_pct / 100.0 * 0.75;
    let irradiance = clear_sky * attenuation;
    SolarWeatherView {
        ts: now,
        irradiance_w_m2: irradiance,
        uv_index: (irradiance / 100.0).min(11.0),
        cloud_cover_pct: weather.cloud_cover_pct,
        sun_hours_today: 12.0 * attenuation,
    }
}
