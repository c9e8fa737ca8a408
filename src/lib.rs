/// nwm_velocity_service: NWM channel velocity snapshot publisher.
///
/// # Module structure
///
/// ```text
/// nwm_velocity_service
/// ├── model       shared data types (ReachId, Measurement, Snapshot, SourceError, ...)
/// ├── config      nwm_velocity.toml loader plus environment overrides
/// ├── logging     logger setup and run summaries
/// ├── job         one locate, transform, publish pass
/// ├── publish     run mode, local/S3 sinks, freshness check
/// ├── ingest
/// │   ├── archive    list/fetch seam and the NOAA S3 client
/// │   ├── nwm        cycle key layout and newest-cycle search
/// │   ├── channel_rt NetCDF decoding and CF unpacking
/// │   └── fixtures (test only) in-memory archive and measurement sets
/// └── analysis
///     ├── categories velocity and flow bands
///     ├── groupings  inner join of velocity and streamflow by reach
///     └── transform  validation, unit conversion, classification
/// ```

/// Public modules
pub mod analysis;
pub mod config;
pub mod ingest;
pub mod job;
pub mod logging;
pub mod model;
pub mod publish;
