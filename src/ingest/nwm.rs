/// NWM cycle locator: key construction and newest-available-cycle search.
///
/// The NOAA archive lays out analysis & assimilation output as:
///   nwm.YYYYMMDD/analysis_assim/nwm.tHHz.analysis_assim.channel_rt.tm00.conus.nc
///
/// One `channel_rt` file per hourly cycle carries both the `velocity` and
/// `streamflow` variables for every reach. Files appear with a lag, so the
/// newest nominal cycle is often not there yet; the locator walks back hour
/// by hour until it finds one, up to the configured lookback.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};

use crate::ingest::archive::Archive;
use crate::model::SourceError;

// ---------------------------------------------------------------------------
// Key construction
// ---------------------------------------------------------------------------

/// Listing prefix for one day of a product, e.g. `nwm.20240501/analysis_assim/`.
pub fn date_prefix(date: NaiveDate, product: &str) -> String {
    format!("nwm.{}/{}/", date.format("%Y%m%d"), product)
}

/// Archive key of the `channel_rt` file for the cycle at `cycle`.
pub fn channel_rt_key(cycle: DateTime<Utc>, product: &str, domain: &str) -> String {
    format!(
        "{}nwm.t{:02}z.{}.channel_rt.tm00.{}.nc",
        date_prefix(cycle.date_naive(), product),
        cycle.hour(),
        product,
        domain
    )
}

// ---------------------------------------------------------------------------
// Cycle search
// ---------------------------------------------------------------------------

/// The cycle the locator settled on.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleLocation {
    /// What the caller asked for (or "now").
    pub requested_time: DateTime<Utc>,
    /// The cycle actually found; may be earlier than requested.
    pub reference_time: DateTime<Utc>,
    pub key: String,
    pub url: String,
}

impl CycleLocation {
    pub fn fell_back(&self) -> bool {
        self.reference_time < truncate_to_hour(self.requested_time)
    }
}

/// Floors a timestamp to the start of its UTC hour.
pub fn truncate_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    let secs = t.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(3600), 0).unwrap_or(t)
}

/// Hourly cycles from `requested` back `lookback_hours`, newest first,
/// both ends inclusive. Lazy, so a wide window costs nothing until walked.
pub fn candidate_cycles(
    requested: DateTime<Utc>,
    lookback_hours: u32,
) -> impl Iterator<Item = DateTime<Utc>> {
    let start = truncate_to_hour(requested);
    (0..=i64::from(lookback_hours)).map_while(move |h| start.checked_sub_signed(Duration::hours(h)))
}

/// Finds the newest cycle at or before `requested` that has a published
/// `channel_rt` file.
///
/// Each day's prefix is listed at most once. A failed listing is logged and
/// treated as "nothing published that day", so one flaky call does not hide
/// an older day that is available.
///
/// # Errors
/// - `SourceError::Listing`: every listing failed; carries the last failure.
/// - `SourceError::Unavailable`: no candidate cycle has a file.
pub fn locate_cycle(
    archive: &dyn Archive,
    product: &str,
    domain: &str,
    requested: DateTime<Utc>,
    lookback_hours: u32,
) -> Result<CycleLocation, SourceError> {
    let mut listings: HashMap<NaiveDate, HashSet<String>> = HashMap::new();
    let mut listed_ok = false;
    let mut last_listing_error: Option<SourceError> = None;

    for cycle in candidate_cycles(requested, lookback_hours) {
        let date = cycle.date_naive();

        let keys = listings.entry(date).or_insert_with(|| {
            let prefix = date_prefix(date, product);
            match archive.list_keys(&prefix) {
                Ok(keys) => {
                    listed_ok = true;
                    keys.into_iter().collect()
                }
                Err(e) => {
                    log::warn!("Error listing {}: {}", prefix, e);
                    last_listing_error = Some(e);
                    HashSet::new()
                }
            }
        });

        let key = channel_rt_key(cycle, product, domain);
        if keys.contains(&key) {
            let location = CycleLocation {
                requested_time: requested,
                reference_time: cycle,
                url: archive.object_url(&key),
                key,
            };

            if location.fell_back() {
                log::info!(
                    "Newest cycle {} not published yet, using {}",
                    truncate_to_hour(requested).to_rfc3339(),
                    cycle.to_rfc3339()
                );
            }
            log::info!("Found NWM file: {}", location.key);

            return Ok(location);
        }
    }

    // Nothing could be listed at all: report why rather than "no data"
    if !listed_ok {
        if let Some(e) = last_listing_error {
            return Err(e);
        }
    }

    Err(SourceError::Unavailable {
        requested,
        lookback_hours,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
