/// Snapshot publisher: local dry-run file or S3 object.
///
/// Either way the previous snapshot is replaced in one step. S3 `PutObject`
/// swaps the object atomically; the local sink writes a temp file next to
/// the target and renames it over. Readers see the old document or the new
/// one, never a mix.
///
/// Before writing, the publisher asks the sink which cycle is currently
/// published and refuses to replace a strictly newer one. Re-publishing the
/// same cycle is allowed, so re-runs are idempotent.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};

use crate::config::OutputConfig;
use crate::model::{PublishError, Snapshot, SnapshotHeader};

/// User metadata key carrying the snapshot's cycle on the S3 object.
pub const REFERENCE_TIME_METADATA: &str = "reference-time";

// ---------------------------------------------------------------------------
// Run mode
// ---------------------------------------------------------------------------

/// Selected by the `--dry-run` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Write locally, never touch the remote sink.
    DryRun,
    /// Upload to the remote sink, never write locally.
    Publish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Local,
    Remote,
}

impl RunMode {
    pub fn sink_kind(&self) -> SinkKind {
        match self {
            RunMode::DryRun => SinkKind::Local,
            RunMode::Publish => SinkKind::Remote,
        }
    }
}

// ---------------------------------------------------------------------------
// Sink interface
// ---------------------------------------------------------------------------

/// Somewhere a snapshot can be written in one atomic replace.
pub trait SnapshotSink {
    fn kind(&self) -> SinkKind;

    /// Human-readable destination (path or URL).
    fn location(&self) -> String;

    /// Cycle of the snapshot currently at the destination, if any.
    fn published_reference_time(&self) -> Result<Option<DateTime<Utc>>, PublishError>;

    /// Replaces the destination with `snapshot`. Returns bytes written.
    fn write(&self, snapshot: &Snapshot) -> Result<usize, PublishError>;
}

/// Builds the sink for `mode`. Dry-run never constructs an S3 client.
pub fn open_sink(mode: RunMode, output: &OutputConfig) -> Result<Box<dyn SnapshotSink>, PublishError> {
    match mode.sink_kind() {
        SinkKind::Local => Ok(Box::new(LocalSink::new(&output.local_path))),
        SinkKind::Remote => Ok(Box::new(S3Sink::connect(output)?)),
    }
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published { location: String, bytes: usize },
    /// A snapshot for a later cycle is already live; nothing was written.
    SkippedNewerExists {
        location: String,
        published: DateTime<Utc>,
    },
}

/// Writes `snapshot` to `sink` unless the sink already holds a newer cycle.
///
/// A failed freshness lookup is logged and the write goes ahead; only the
/// write itself can fail the publish.
///
/// # Errors
/// - `PublishError` from the sink's write. The previous snapshot stays live.
pub fn publish(snapshot: &Snapshot, sink: &dyn SnapshotSink) -> Result<PublishOutcome, PublishError> {
    let location = sink.location();

    match sink.published_reference_time() {
        Ok(Some(published)) if published > snapshot.reference_time() => {
            log::warn!(
                "{} already holds cycle {}, newer than {}; not overwriting",
                location,
                published.to_rfc3339(),
                snapshot.reference_time().to_rfc3339()
            );
            return Ok(PublishOutcome::SkippedNewerExists {
                location,
                published,
            });
        }
        Ok(_) => {}
        Err(e) => log::warn!("Freshness check failed, publishing anyway: {}", e),
    }

    let bytes = sink.write(snapshot)?;
    log::info!(
        "Published {} sites ({:.2} MB) to {}",
        snapshot.site_count(),
        bytes as f64 / 1_048_576.0,
        location
    );

    Ok(PublishOutcome::Published { location, bytes })
}

// ---------------------------------------------------------------------------
// Local sink (dry-run)
// ---------------------------------------------------------------------------

/// Pretty-printed JSON file on local disk.
#[derive(Debug, Clone)]
pub struct LocalSink {
    path: PathBuf,
}

impl LocalSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

impl SnapshotSink for LocalSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Local
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn published_reference_time(&self) -> Result<Option<DateTime<Utc>>, PublishError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read(&self.path)?;
        let header: SnapshotHeader =
            serde_json::from_slice(&contents).map_err(|e| PublishError::Head {
                location: self.location(),
                source: Box::new(e),
            })?;

        Ok(Some(header.reference_time))
    }

    fn write(&self, snapshot: &Snapshot) -> Result<usize, PublishError> {
        let body = snapshot.to_json_pretty()?;

        let dir = self.parent_dir();
        fs::create_dir_all(dir)?;

        let mut scratch = tempfile::NamedTempFile::new_in(dir)?;
        scratch.write_all(&body)?;
        scratch.as_file().sync_all()?;
        scratch.persist(&self.path).map_err(|e| e.error)?;

        log::info!("[DRY RUN] Saved snapshot to {}", self.path.display());
        Ok(body.len())
    }
}

// ---------------------------------------------------------------------------
// S3 sink
// ---------------------------------------------------------------------------

/// Compact JSON object in an S3 bucket.
pub struct S3Sink {
    runtime: tokio::runtime::Runtime,
    client: aws_sdk_s3::Client,
    bucket: String,
    key: String,
    region: String,
    cache_control: String,
}

impl S3Sink {
    /// Builds a client from the standard AWS credential chain, using the
    /// configured profile if one is set. No request is made here.
    pub fn connect(output: &OutputConfig) -> Result<Self, PublishError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(output.region.clone()));
        if let Some(profile) = &output.profile {
            log::info!("Using AWS profile: {}", profile);
            loader = loader.profile_name(profile);
        }
        let sdk_config = runtime.block_on(loader.load());

        Ok(Self {
            runtime,
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket: output.bucket.clone(),
            key: output.object_key(),
            region: output.region.clone(),
            cache_control: output.cache_control.clone(),
        })
    }

    fn head_error(&self, source: Box<dyn std::error::Error + Send + Sync>) -> PublishError {
        PublishError::Head {
            location: format!("s3://{}/{}", self.bucket, self.key),
            source,
        }
    }
}

impl SnapshotSink for S3Sink {
    fn kind(&self) -> SinkKind {
        SinkKind::Remote
    }

    fn location(&self) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket, self.region, self.key
        )
    }

    fn published_reference_time(&self) -> Result<Option<DateTime<Utc>>, PublishError> {
        let result = self.runtime.block_on(
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .send(),
        );

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                // First publish: nothing there yet
                if err.as_service_error().is_some_and(HeadObjectError::is_not_found) {
                    return Ok(None);
                }
                return Err(self.head_error(Box::new(err)));
            }
        };

        let Some(raw) = output
            .metadata()
            .and_then(|m| m.get(REFERENCE_TIME_METADATA))
        else {
            log::warn!("Published object has no {} metadata", REFERENCE_TIME_METADATA);
            return Ok(None);
        };

        DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| self.head_error(Box::new(e)))
    }

    fn write(&self, snapshot: &Snapshot) -> Result<usize, PublishError> {
        let body = snapshot.to_json_compact()?;
        let size = body.len();

        self.runtime
            .block_on(
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(&self.key)
                    .body(ByteStream::from(body))
                    .content_type("application/json")
                    .cache_control(&self.cache_control)
                    .metadata(REFERENCE_TIME_METADATA, snapshot.reference_time().to_rfc3339())
                    .send(),
            )
            .map_err(|e| PublishError::Upload {
                bucket: self.bucket.clone(),
                key: self.key.clone(),
                source: Box::new(e),
            })?;

        Ok(size)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
