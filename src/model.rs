/// Core data types for the NWM velocity snapshot service.
///
/// This module defines the shared domain model imported by all other modules:
/// reach identifiers, raw measurements, classified records, the published
/// snapshot, and the error taxonomy for each pipeline stage.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::analysis::categories::{FlowCategory, VelocityCategory};

// ---------------------------------------------------------------------------
// Unit conversion factors
// ---------------------------------------------------------------------------

/// Feet per meter, for m/s → ft/s.
pub const FEET_PER_METER: f64 = 3.28084;

/// Cubic feet per cubic meter, for m³/s → ft³/s.
pub const CUBIC_FEET_PER_CUBIC_METER: f64 = 35.3147;

/// Decimal places kept for numeric fields in the published document.
pub const DISPLAY_DECIMALS: i32 = 3;

// ---------------------------------------------------------------------------
// Measurement types
// ---------------------------------------------------------------------------

/// NWM reach identifier (`feature_id`, an NHDPlus COMID).
///
/// Kept as the exact decimal string of the upstream integer so it joins
/// against the client's vector tiles without reformatting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReachId(String);

impl ReachId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for ReachId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ReachId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Channel routing variables consumed from the NWM output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    /// Water velocity, m/s.
    Velocity,
    /// Discharge, m³/s.
    Streamflow,
}

impl Variable {
    /// Variable name inside the NWM `channel_rt` NetCDF file.
    pub fn netcdf_name(&self) -> &'static str {
        match self {
            Variable::Velocity => "velocity",
            Variable::Streamflow => "streamflow",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Variable::Velocity => "m/s",
            Variable::Streamflow => "m3/s",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.netcdf_name())
    }
}

/// One value of one variable for one reach in one forecast cycle.
///
/// `value` is `None` when the upstream file carries its fill value.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub reach_id: ReachId,
    pub variable: Variable,
    pub value: Option<f64>,
}

impl Measurement {
    pub fn new(reach_id: impl Into<String>, variable: Variable, value: Option<f64>) -> Self {
        Self {
            reach_id: ReachId::new(reach_id),
            variable,
            value,
        }
    }
}

/// Decoded contents of one `channel_rt` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelData {
    pub velocity: Vec<Measurement>,
    pub streamflow: Vec<Measurement>,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Per-reach record published in the snapshot.
///
/// Holds full-precision values; rounding happens only at serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedRecord {
    #[serde(serialize_with = "serialize_rounded")]
    pub velocity_ms: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub streamflow_cms: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub velocity_fps: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub streamflow_cfs: f64,
    pub velocity_category: VelocityCategory,
    pub flow_category: FlowCategory,
}

/// The published document.
///
/// `site_count` is derived from `sites` at construction and the fields are
/// private, so the two cannot drift apart.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    generated_at: DateTime<Utc>,
    reference_time: DateTime<Utc>,
    site_count: usize,
    sites: BTreeMap<ReachId, ClassifiedRecord>,
}

impl Snapshot {
    pub fn new(
        generated_at: DateTime<Utc>,
        reference_time: DateTime<Utc>,
        sites: BTreeMap<ReachId, ClassifiedRecord>,
    ) -> Self {
        Self {
            generated_at,
            reference_time,
            site_count: sites.len(),
            sites,
        }
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.reference_time
    }

    pub fn site_count(&self) -> usize {
        self.site_count
    }

    pub fn sites(&self) -> &BTreeMap<ReachId, ClassifiedRecord> {
        &self.sites
    }

    /// Compact JSON, as uploaded to the object store.
    pub fn to_json_compact(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Indented JSON, as written in dry-run mode for inspection.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

/// Header fields of a previously published snapshot, used for the
/// freshness check. Other fields are ignored.
#[derive(Debug, Deserialize)]
pub struct SnapshotHeader {
    pub reference_time: DateTime<Utc>,
}

/// Rounds to `DISPLAY_DECIMALS` places. Values too large to scale are
/// returned unchanged.
pub fn round_for_display(value: f64) -> f64 {
    let factor = 10f64.powi(DISPLAY_DECIMALS);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

fn serialize_rounded<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_for_display(*value))
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while locating, fetching, or decoding upstream data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No cycle inside the lookback window has a published file.
    #[error("No NWM data found within {lookback_hours} hours of {requested}")]
    Unavailable {
        requested: DateTime<Utc>,
        lookback_hours: u32,
    },

    /// Listing an archive prefix failed.
    #[error("Failed to list s3://{bucket}/{prefix}: {source}")]
    Listing {
        bucket: String,
        prefix: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Non-2xx HTTP response from the archive.
    #[error("HTTP error {status} fetching {url}")]
    Http { url: String, status: u16 },

    /// Transport-level failure talking to the archive.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The file could not be decoded into measurements.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Data-quality problems with a single reach. Never fatal on its own.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("reach {reach_id}: {variable} is missing")]
    Missing { reach_id: ReachId, variable: Variable },

    #[error("reach {reach_id}: {variable} is negative ({value} {})", .variable.unit())]
    Negative {
        reach_id: ReachId,
        variable: Variable,
        value: f64,
    },

    #[error("reach {reach_id}: {variable} is not finite ({value})")]
    NonFinite {
        reach_id: ReachId,
        variable: Variable,
        value: f64,
    },
}

/// Errors raised while writing the snapshot to a sink.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading the currently published snapshot failed.
    #[error("Failed to read published snapshot at {location}: {source}")]
    Head {
        location: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The object store rejected the write.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        bucket: String,
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reach_id_preserves_upstream_digits() {
        let id = ReachId::from(101_i64);
        assert_eq!(id.as_str(), "101");

        let padded = ReachId::new("0004512");
        assert_eq!(padded.to_string(), "0004512", "String ids are never reformatted");
    }

    #[test]
    fn test_round_for_display() {
        assert_eq!(round_for_display(1.476378), 1.476);
        assert_eq!(round_for_display(441.43375), 441.434);
        assert_eq!(round_for_display(0.0), 0.0);
    }

    #[test]
    fn test_round_for_display_keeps_huge_values_finite() {
        let huge = 1.0e306;
        assert_eq!(round_for_display(huge), huge);
        assert_eq!(round_for_display(f64::MAX), f64::MAX);

        let record = crate::analysis::transform::classify(0.5, f64::MAX / 100.0);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["streamflow_cms"].is_number());
    }

    #[test]
    fn test_variable_names_match_netcdf() {
        assert_eq!(Variable::Velocity.netcdf_name(), "velocity");
        assert_eq!(Variable::Streamflow.netcdf_name(), "streamflow");
        assert_eq!(Variable::Streamflow.unit(), "m3/s");
    }

    #[test]
    fn test_record_error_messages_name_the_reach() {
        let err = RecordError::Negative {
            reach_id: ReachId::new("42"),
            variable: Variable::Velocity,
            value: -0.5,
        };
        assert_eq!(err.to_string(), "reach 42: velocity is negative (-0.5 m/s)");
    }
}
