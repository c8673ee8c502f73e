//! Query-time bucketing of raw readings into hour/day/month/year aggregates.
//!
//! Policy, per field class:
//! - power fields (kw*, kva*, kvar*) are summed within a bucket; the chart
//!   "production" value is the summed kwt
//! - voltage, current, frequency, and power factor are arithmetic means
//! - cumulative energy registers (kwh_*, kvarh_*) become last-minus-first
//!   within the bucket, clamped at zero to guard against counter resets
//!
//! All truncation happens in UTC.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;

use crate::reading::Reading;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Month,
    Year,
}

/// One aggregated time bucket. Derived at query time, never persisted.
#[derive(Clone, Debug, Serialize)]
pub struct Bucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub samples: usize,
    // Averaged fields.
    pub v1: f64,
    pub v2: f64,
    pub v3: f64,
    pub v12: f64,
    pub v23: f64,
    pub v31: f64,
    pub a1: f64,
    pub a2: f64,
    pub a3: f64,
    pub pf1: f64,
    pub pf2: f64,
    pub pf3: f64,
    pub pft: f64,
    pub hz: f64,
    // Summed fields.
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
    // Energy deltas over the bucket (register last minus first, >= 0).
    pub kwh_import: f64,
    pub kwh_export: f64,
    pub kvarh_import: f64,
    pub kvarh_export: f64,
}

/// Truncate a timestamp to the start of its bucket, in UTC.
pub fn bucket_start(ts: DateTime<Utc>, granularity: Granularity) -> DateTime<Utc> {
    let date = ts.date_naive();
    let naive = match granularity {
        Granularity::Hour => {
            let time = NaiveTime::from_hms_opt(ts.hour(), 0, 0).unwrap_or(NaiveTime::MIN);
            date.and_time(time)
        }
        Granularity::Day => date.and_time(NaiveTime::MIN),
        Granularity::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
            .unwrap_or(date)
            .and_time(NaiveTime::MIN),
        Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)
            .unwrap_or(date)
            .and_time(NaiveTime::MIN),
    };
    Utc.from_utc_datetime(&naive)
}

/// Start of the bucket following `start`.
pub fn bucket_end(start: DateTime<Utc>, granularity: Granularity) -> DateTime<Utc> {
    match granularity {
        Granularity::Hour => start + Duration::hours(1),
        Granularity::Day => start + Duration::days(1),
        Granularity::Month => add_months(start, 1),
        Granularity::Year => add_months(start, 12),
    }
}

fn add_months(start: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    let date = start
        .date_naive()
        .checked_add_months(Months::new(months))
        .unwrap_or_else(|| start.date_naive());
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Group readings by truncated timestamp and aggregate each group.
/// Output is sorted ascending by bucket start with no duplicate keys;
/// every input reading lands in exactly one bucket. Empty in, empty out.
pub fn bucket_readings(readings: &[Reading], granularity: Granularity) -> Vec<Bucket> {
    let mut groups: BTreeMap<DateTime<Utc>, BucketBuilder> = BTreeMap::new();
    for reading in readings {
        groups
            .entry(bucket_start(reading.ts, granularity))
            .or_default()
            .add(reading);
    }
    groups
        .into_iter()
        .map(|(start, builder)| builder.finish(start, bucket_end(start, granularity)))
        .collect()
}

#[derive(Default)]
struct BucketBuilder {
    samples: usize,
    v1: f64,
    v2: f64,
    v3: f64,
    v12: f64,
    v23: f64,
    v31: f64,
    a1: f64,
    a2: f64,
    a3: f64,
    pf1: f64,
    pf2: f64,
    pf3: f64,
    pft: f64,
    hz: f64,
    kw1: f64,
    kw2: f64,
    kw3: f64,
    kwt: f64,
    kva1: f64,
    kva2: f64,
    kva3: f64,
    kvat: f64,
    kvar1: f64,
    kvar2: f64,
    kvar3: f64,
    kvart: f64,
    // First/last register values seen, in input order. Inputs arrive
    // ascending from the reader, so first is the oldest sample.
    first_registers: Option<[f64; 4]>,
    last_registers: [f64; 4],
}

impl BucketBuilder {
    fn add(&mut self, r: &Reading) {
        self.samples += 1;
        self.v1 += r.v1;
        self.v2 += r.v2;
        self.v3 += r.v3;
        self.v12 += r.v12;
        self.v23 += r.v23;
        self.v31 += r.v31;
        self.a1 += r.a1;
        self.a2 += r.a2;
        self.a3 += r.a3;
        self.pf1 += r.pf1;
        self.pf2 += r.pf2;
        self.pf3 += r.pf3;
        self.pft += r.pft;
        self.hz += r.hz;
        self.kw1 += r.kw1;
        self.kw2 += r.kw2;
        self.kw3 += r.kw3;
        self.kwt += r.kwt;
        self.kva1 += r.kva1;
        self.kva2 += r.kva2;
        self.kva3 += r.kva3;
        self.kvat += r.kvat;
        self.kvar1 += r.kvar1;
        self.kvar2 += r.kvar2;
        self.kvar3 += r.kvar3;
        self.kvart += r.kvart;

        let registers = [r.kwh_import, r.kwh_export, r.kvarh_import, r.kvarh_export];
        if self.first_registers.is_none() {
            self.first_registers = Some(registers);
        }
        self.last_registers = registers;
    }

    fn finish(self, start: DateTime<Utc>, end: DateTime<Utc>) -> Bucket {
        let n = self.samples.max(1) as f64;
        let first = self.first_registers.unwrap_or(self.last_registers);
        let delta = |i: usize| (self.last_registers[i] - first[i]).max(0.0);
        Bucket {
            start,
            end,
            samples: self.samples,
            v1: self.v1 / n,
            v2: self.v2 / n,
            v3: self.v3 / n,
            v12: self.v12 / n,
            v23: self.v23 / n,
            v31: self.v31 / n,
            a1: self.a1 / n,
            a2: self.a2 / n,
            a3: self.a3 / n,
            pf1: self.pf1 / n,
            pf2: self.pf2 / n,
            pf3: self.pf3 / n,
            pft: self.pft / n,
            hz: self.hz / n,
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
            kwh_import: delta(0),
            kwh_export: delta(1),
            kvarh_import: delta(2),
            kvarh_export: delta(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    use super::*;
    use crate::reading::SourceId;

    fn reading(ts: DateTime<Utc>, kwt: f64, kwh_import: f64) -> Reading {
        Reading {
            source: SourceId::Grid1,
            ts,
            v1: 230.0,
            v2: 231.0,
            v3: 229.0,
            v12: 398.0,
            v23: 399.0,
            v31: 397.0,
            a1: 10.0,
            a2: 11.0,
            a3: 9.0,
            kw1: kwt / 3.0,
            kw2: kwt / 3.0,
            kw3: kwt / 3.0,
            kwt,
            kva1: kwt / 2.7,
            kva2: kwt / 2.7,
            kva3: kwt / 2.7,
            kvat: kwt / 0.9,
            kvar1: 0.5,
            kvar2: 0.5,
            kvar3: 0.5,
            kvart: 1.5,
            pf1: 0.9,
            pf2: 0.92,
            pf3: 0.88,
            pft: 0.9,
            hz: 50.0,
            kwh_import,
            kwh_export: 0.0,
            kvarh_import: 0.0,
            kvarh_export: 0.0,
        }
    }

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(bucket_readings(&[], Granularity::Hour).is_empty());
    }

    #[test]
    fn every_reading_lands_in_exactly_one_sorted_bucket() {
        let readings: Vec<Reading> = (0..10)
            .map(|i| reading(t(i % 5, (i * 7) % 60), 1.0, 100.0 + i as f64))
            .collect();
        let buckets = bucket_readings(&readings, Granularity::Hour);

        let total: usize = buckets.iter().map(|b| b.samples).sum();
        assert_eq!(total, readings.len());
        for pair in buckets.windows(2) {
            assert!(pair[0].start < pair[1].start, "buckets out of order");
        }
        for bucket in &buckets {
            assert_eq!(bucket.end, bucket.start + Duration::hours(1));
        }
    }

    #[test]
    fn summed_fields_are_conserved_across_buckets() {
        let readings: Vec<Reading> = (0..24)
            .map(|i| reading(t(i % 24, 15), (i + 1) as f64, 0.0))
            .collect();
        let buckets = bucket_readings(&readings, Granularity::Hour);

        let bucketed: f64 = buckets.iter().map(|b| b.kwt).sum();
        let raw: f64 = readings.iter().map(|r| r.kwt).sum();
        assert_relative_eq!(bucketed, raw, epsilon = 1e-9);
    }

    #[test]
    fn hourly_production_uses_the_sum_policy() {
        // Spec scenario: kwt 10 at T0 and 12 at T0+30m in one hour => 22.
        let readings = vec![reading(t(8, 0), 10.0, 0.0), reading(t(8, 30), 12.0, 0.0)];
        let buckets = bucket_readings(&readings, Granularity::Hour);
        assert_eq!(buckets.len(), 1);
        assert_relative_eq!(buckets[0].kwt, 22.0, epsilon = 1e-9);
    }

    #[test]
    fn electrical_fields_are_averaged() {
        let mut a = reading(t(8, 0), 10.0, 0.0);
        let mut b = reading(t(8, 30), 10.0, 0.0);
        a.v1 = 228.0;
        b.v1 = 232.0;
        a.hz = 49.8;
        b.hz = 50.2;
        let buckets = bucket_readings(&[a, b], Granularity::Hour);
        assert_relative_eq!(buckets[0].v1, 230.0, epsilon = 1e-9);
        assert_relative_eq!(buckets[0].hz, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn energy_registers_become_clamped_deltas() {
        let readings = vec![
            reading(t(8, 0), 1.0, 100.0),
            reading(t(8, 20), 1.0, 103.5),
            reading(t(8, 40), 1.0, 107.0),
        ];
        let buckets = bucket_readings(&readings, Granularity::Hour);
        assert_relative_eq!(buckets[0].kwh_import, 7.0, epsilon = 1e-9);

        // Counter reset mid-bucket must not go negative.
        let reset = vec![reading(t(9, 0), 1.0, 500.0), reading(t(9, 30), 1.0, 2.0)];
        let buckets = bucket_readings(&reset, Granularity::Hour);
        assert_eq!(buckets[0].kwh_import, 0.0);
    }

    #[test]
    fn single_reading_aggregates_trivially() {
        let r = reading(t(8, 0), 7.5, 42.0);
        let buckets = bucket_readings(std::slice::from_ref(&r), Granularity::Day);
        assert_eq!(buckets.len(), 1);
        assert_relative_eq!(buckets[0].kwt, r.kwt);
        assert_relative_eq!(buckets[0].v1, r.v1);
        assert_eq!(buckets[0].kwh_import, 0.0);
    }

    #[test]
    fn month_and_year_truncation() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 10, 8, 45, 12).unwrap();
        assert_eq!(
            bucket_start(ts, Granularity::Month),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            bucket_start(ts, Granularity::Year),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            bucket_end(bucket_start(ts, Granularity::Month), Granularity::Month),
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
        );
    }
}
