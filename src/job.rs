/// One pass of the snapshot job.
///
/// Locates the newest published cycle, downloads and decodes its
/// `channel_rt` file, classifies every reach, and hands the snapshot to the
/// sink picked by the run mode. The job holds no state between runs and is
/// safe to re-run; every failure happens before or during the single write.

use chrono::{DateTime, Utc};

use crate::analysis::transform::{self, TransformStats};
use crate::config::Config;
use crate::ingest::archive::Archive;
use crate::ingest::channel_rt::ChannelDecoder;
use crate::ingest::nwm::{self, CycleLocation};
use crate::logging::log_transform_summary;
use crate::model::{PublishError, Snapshot, SourceError};
use crate::publish::{self, PublishOutcome, SnapshotSink};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Every reach was dropped; nothing is published.
    #[error("No valid reaches in cycle {reference_time} ({} dropped)", .stats.dropped())]
    EmptyResult {
        reference_time: DateTime<Utc>,
        stats: TransformStats,
    },

    #[error(transparent)]
    Publish(#[from] PublishError),
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// What a finished run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub location: CycleLocation,
    pub site_count: usize,
    pub stats: TransformStats,
    pub outcome: PublishOutcome,
}

impl RunReport {
    pub fn requested_time(&self) -> DateTime<Utc> {
        self.location.requested_time
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.location.reference_time
    }

    pub fn published(&self) -> bool {
        matches!(self.outcome, PublishOutcome::Published { .. })
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

pub struct Job {
    config: Config,
}

impl Job {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs locate, fetch, decode, transform, and publish once.
    ///
    /// `requested` is the cycle to aim for; `None` means `now`. The snapshot
    /// is stamped with `now` as its generation time.
    ///
    /// # Errors
    /// - `JobError::Source` if no cycle is found or the file can't be read.
    /// - `JobError::EmptyResult` if no reach survives validation.
    /// - `JobError::Publish` if the sink write fails.
    pub fn run(
        &self,
        archive: &dyn Archive,
        decoder: &dyn ChannelDecoder,
        sink: &dyn SnapshotSink,
        requested: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<RunReport, JobError> {
        let archive_config = &self.config.archive;
        let requested = requested.unwrap_or(now);

        log::info!(
            "Looking for {} cycle at or before {} (lookback {}h)",
            archive_config.product,
            requested.to_rfc3339(),
            self.config.lookback_hours
        );
        let location = nwm::locate_cycle(
            archive,
            &archive_config.product,
            &archive_config.domain,
            requested,
            self.config.lookback_hours,
        )?;

        let bytes = archive.fetch(&location.key)?;
        let data = decoder.decode(&bytes)?;
        log::info!(
            "Decoded {} velocity and {} streamflow values",
            data.velocity.len(),
            data.streamflow.len()
        );

        let output = transform::transform(data, self.config.min_streamflow_cms);
        log_transform_summary(&output.stats);

        if output.sites.is_empty() {
            return Err(JobError::EmptyResult {
                reference_time: location.reference_time,
                stats: output.stats,
            });
        }

        let snapshot = Snapshot::new(now, location.reference_time, output.sites);
        let site_count = snapshot.site_count();
        let outcome = publish::publish(&snapshot, sink)?;

        Ok(RunReport {
            location,
            site_count,
            stats: output.stats,
            outcome,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
