//! Time-range tokens and their resolution into concrete UTC query windows.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;

/// A concrete, inclusive query window in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// The immediately preceding window of equal length. This is what makes
    /// "% vs. previous period" comparisons well-defined for every token.
    /// Windows are closed on both ends, so the comparison stops one
    /// microsecond (the timestamptz resolution) short of `start`; a sample
    /// landing exactly on the boundary counts only in the current window.
    pub fn comparison(&self) -> Window {
        Window {
            start: self.start - self.span(),
            end: self.start - Duration::microseconds(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeRange {
    Last24h,
    Last7d,
    Last30d,
    Custom { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeRangeError {
    #[error("unrecognized time range token `{0}`")]
    Unrecognized(String),
    #[error("invalid date in custom range `{0}` (expected custom:YYYY-MM-DD:YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("custom range ends before it starts")]
    Inverted,
}

impl FromStr for TimeRange {
    type Err = TimeRangeError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "last-24h" => Ok(TimeRange::Last24h),
            "last-7d" => Ok(TimeRange::Last7d),
            "last-30d" => Ok(TimeRange::Last30d),
            _ => {
                let Some(rest) = token.strip_prefix("custom:") else {
                    return Err(TimeRangeError::Unrecognized(token.to_string()));
                };
                let Some((start, end)) = rest.split_once(':') else {
                    return Err(TimeRangeError::InvalidDate(token.to_string()));
                };
                let parse = |s: &str| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .map_err(|_| TimeRangeError::InvalidDate(token.to_string()))
                };
                let (start, end) = (parse(start)?, parse(end)?);
                if end < start {
                    return Err(TimeRangeError::Inverted);
                }
                Ok(TimeRange::Custom { start, end })
            }
        }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange::Last24h
    }
}

impl TimeRange {
    /// Resolve the token against a fixed instant. Deterministic in `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> Window {
        match *self {
            TimeRange::Last24h => Window {
                start: now - Duration::hours(24),
                end: now,
            },
            TimeRange::Last7d => Window {
                start: now - Duration::days(7),
                end: now,
            },
            TimeRange::Last30d => Window {
                start: now - Duration::days(30),
                end: now,
            },
            TimeRange::Custom { start, end } => Window {
                start: at_midnight(start),
                // Inclusive through the last second of the end date.
                end: at_midnight(end) + Duration::seconds(86_399),
            },
        }
    }
}

fn at_midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0).unwrap()
    }

    #[test]
    fn relative_tokens_resolve_back_from_now() {
        let now = instant();
        let w = "last-24h".parse::<TimeRange>().unwrap().resolve(now);
        assert_eq!(w.end, now);
        assert_eq!(w.span(), Duration::hours(24));

        let w = "last-7d".parse::<TimeRange>().unwrap().resolve(now);
        assert_eq!(w.span(), Duration::days(7));

        let w = "last-30d".parse::<TimeRange>().unwrap().resolve(now);
        assert_eq!(w.span(), Duration::days(30));
    }

    #[test]
    fn resolution_is_deterministic_for_a_fixed_instant() {
        let now = instant();
        let range = "last-24h".parse::<TimeRange>().unwrap();
        assert_eq!(range.resolve(now), range.resolve(now));
    }

    #[test]
    fn custom_range_covers_whole_days_inclusive() {
        let w = "custom:2024-01-01:2024-01-03"
            .parse::<TimeRange>()
            .unwrap()
            .resolve(instant());
        assert_eq!(w.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2024, 1, 3, 23, 59, 59).unwrap());
        // Exactly three calendar days, inclusive.
        assert_eq!(w.span(), Duration::days(3) - Duration::seconds(1));
    }

    #[test]
    fn comparison_window_is_the_preceding_equal_period() {
        let now = instant();
        let w = TimeRange::Last24h.resolve(now);
        let prev = w.comparison();
        assert_eq!(prev.end, w.start - Duration::microseconds(1));
        // Same period length, minus the boundary instant ceded to `w`.
        assert_eq!(prev.span(), w.span() - Duration::microseconds(1));
        assert_eq!(prev.start, now - Duration::hours(48));
    }

    #[test]
    fn window_boundary_sample_belongs_to_exactly_one_window() {
        let w = TimeRange::Last7d.resolve(instant());
        let prev = w.comparison();
        // Both windows are closed, so the shared instant must not be double
        // counted in current and baseline totals.
        assert!(w.contains(w.start));
        assert!(!prev.contains(w.start));
        assert!(prev.contains(w.start - Duration::microseconds(1)));
    }

    #[test]
    fn bad_tokens_are_rejected() {
        assert_eq!(
            "last-1y".parse::<TimeRange>(),
            Err(TimeRangeError::Unrecognized("last-1y".to_string()))
        );
        assert!(matches!(
            "custom:2024-13-01:2024-01-02".parse::<TimeRange>(),
            Err(TimeRangeError::InvalidDate(_))
        ));
        assert!(matches!(
            "custom:2024-01-05".parse::<TimeRange>(),
            Err(TimeRangeError::InvalidDate(_))
        ));
        assert_eq!(
            "custom:2024-01-05:2024-01-01".parse::<TimeRange>(),
            Err(TimeRangeError::Inverted)
        );
    }
}
