/// Test fixtures: an in-memory NWM archive and representative measurement
/// sets. Compiled for tests only (see `ingest/mod.rs`).
///
/// The measurement sets mirror what the NetCDF decoder yields for a
/// `channel_rt` file after unpacking: parallel velocity and streamflow lists
/// keyed by COMID, with `None` where the file held its fill value.
///
/// Values are picked to land in specific bands.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::ingest::archive::Archive;
use crate::ingest::channel_rt::ChannelDecoder;
use crate::ingest::nwm::channel_rt_key;
use crate::model::{ChannelData, Measurement, SourceError, Variable};

// ---------------------------------------------------------------------------
// Measurement sets
// ---------------------------------------------------------------------------

/// A complete cycle: six reaches present in both sets, one of them with a
/// negative velocity and one with a missing streamflow.
pub(crate) fn fixture_channel_data() -> ChannelData {
    // (comid, velocity m/s, streamflow m3/s)
    let rows: &[(&str, Option<f64>, Option<f64>)] = &[
        ("13293750", Some(0.45), Some(12.5)),   // moderate / moderate
        ("13293752", Some(1.0), Some(250.0)),   // very_fast / very_high
        ("13293754", Some(0.05), Some(0.4)),    // very_slow / very_low
        ("13293756", Some(2.4), Some(1450.0)),  // extreme / extreme
        ("13293758", Some(-0.5), Some(3.0)),    // invalid velocity
        ("13293760", Some(0.7), None),          // missing streamflow
    ];

    ChannelData {
        velocity: rows
            .iter()
            .map(|(id, v, _)| Measurement::new(*id, Variable::Velocity, *v))
            .collect(),
        streamflow: rows
            .iter()
            .map(|(id, _, q)| Measurement::new(*id, Variable::Streamflow, *q))
            .collect(),
    }
}

/// A partially published cycle: reach 9001 only has velocity, 9002 only
/// has streamflow, 9003 has both.
pub(crate) fn fixture_partial_cycle() -> ChannelData {
    ChannelData {
        velocity: vec![
            Measurement::new("9001", Variable::Velocity, Some(0.8)),
            Measurement::new("9003", Variable::Velocity, Some(0.2)),
        ],
        streamflow: vec![
            Measurement::new("9002", Variable::Streamflow, Some(60.0)),
            Measurement::new("9003", Variable::Streamflow, Some(5.0)),
        ],
    }
}

/// A cycle where every reach is invalid.
pub(crate) fn fixture_all_invalid() -> ChannelData {
    ChannelData {
        velocity: vec![
            Measurement::new("1", Variable::Velocity, None),
            Measurement::new("2", Variable::Velocity, Some(-1.0)),
        ],
        streamflow: vec![
            Measurement::new("1", Variable::Streamflow, Some(3.0)),
            Measurement::new("2", Variable::Streamflow, Some(3.0)),
        ],
    }
}

// ---------------------------------------------------------------------------
// In-memory archive
// ---------------------------------------------------------------------------

/// Archive holding `channel_rt` keys for a chosen set of cycles.
pub(crate) struct FixtureArchive {
    keys: Vec<String>,
    failing_prefixes: HashSet<String>,
    bodies: HashMap<String, Vec<u8>>,
    list_calls: Cell<usize>,
    fetched: RefCell<Vec<String>>,
}

impl FixtureArchive {
    pub(crate) fn with_cycles(cycles: &[DateTime<Utc>]) -> Self {
        let keys: Vec<String> = cycles
            .iter()
            .map(|c| channel_rt_key(*c, "analysis_assim", "conus"))
            .collect();
        let bodies = keys
            .iter()
            .map(|k| (k.clone(), b"CDF\x01fixture".to_vec()))
            .collect();

        Self {
            keys,
            failing_prefixes: HashSet::new(),
            bodies,
            list_calls: Cell::new(0),
            fetched: RefCell::new(Vec::new()),
        }
    }

    /// Makes `list_keys` fail for exactly this prefix.
    pub(crate) fn failing_prefix(mut self, prefix: &str) -> Self {
        self.failing_prefixes.insert(prefix.to_string());
        self
    }

    pub(crate) fn listed_prefixes(&self) -> usize {
        self.list_calls.get()
    }

    pub(crate) fn fetched_keys(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl Archive for FixtureArchive {
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, SourceError> {
        self.list_calls.set(self.list_calls.get() + 1);

        if self.failing_prefixes.contains(prefix) {
            return Err(SourceError::Listing {
                bucket: "fixture".to_string(),
                prefix: prefix.to_string(),
                source: "simulated listing failure".into(),
            });
        }

        Ok(self
            .keys
            .iter()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, SourceError> {
        self.fetched.borrow_mut().push(key.to_string());
        self.bodies.get(key).cloned().ok_or_else(|| SourceError::Http {
            url: self.object_url(key),
            status: 404,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("https://fixture.invalid/{}", key)
    }
}

/// Decoder that ignores the bytes and hands back a canned cycle.
pub(crate) struct FixtureDecoder(pub(crate) ChannelData);

impl ChannelDecoder for FixtureDecoder {
    fn decode(&self, _bytes: &[u8]) -> Result<ChannelData, SourceError> {
        Ok(self.0.clone())
    }
}
