//! Shared telemetry types and calculation logic for the dashboard service.
//! Keep this crate free of HTTP/SQL deps so the service and any future data
//! generators can reuse it.

pub mod aggregate;
pub mod distribution;
pub mod formulas;
pub mod metrics;
pub mod reading;
pub mod timerange;

pub use aggregate::{Bucket, Granularity, bucket_readings};
pub use distribution::{DistributionEntry, distribution};
pub use reading::{Reading, SourceId, SourceKind, UnknownSource};
pub use timerange::{TimeRange, TimeRangeError, Window};
