/// Upstream data access for the NWM archive.
///
/// - `archive`: list/fetch interface and the anonymous S3/HTTPS client
/// - `nwm`: cycle key layout and newest-available-cycle search
/// - `channel_rt`: NetCDF `channel_rt` decoding into measurements
/// - `fixtures` (test only): in-memory archive and measurement sets

pub mod archive;
pub mod channel_rt;
pub mod nwm;

#[cfg(test)]
pub(crate) mod fixtures;
