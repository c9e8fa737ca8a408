/// Service configuration loader - parses nwm_velocity.toml plus environment
///
/// Keeps bucket names, key layout, and the lookback window out of the code,
/// so a deployment can retarget the output bucket or widen the lookback
/// without recompiling. Credentials are never read here; the AWS SDK picks
/// them up from its standard provider chain (optionally via `AWS_PROFILE`).

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_PATH: &str = "nwm_velocity.toml";

/// Widest accepted lookback window, about the archive's retention (30 days).
pub const MAX_LOOKBACK_HOURS: u32 = 720;

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How far back (hours) to search for a published cycle.
    pub lookback_hours: u32,
    /// Reaches with less streamflow (m³/s) are left out. 0 keeps everything.
    pub min_streamflow_cms: f64,
    pub archive: ArchiveConfig,
    pub output: OutputConfig,
}

/// Upstream NWM archive location.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub bucket: String,
    pub region: String,
    /// Public HTTPS endpoint used for the file download.
    pub base_url: String,
    /// NWM product directory, e.g. `analysis_assim`.
    pub product: String,
    /// Model domain suffix, e.g. `conus`.
    pub domain: String,
    pub timeout_secs: u64,
}

/// Snapshot destination.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub bucket: String,
    pub region: String,
    /// Named AWS profile; the default credential chain is used when unset.
    pub profile: Option<String>,
    pub key_prefix: String,
    pub object_name: String,
    pub cache_control: String,
    /// Dry-run output file.
    pub local_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lookback_hours: 48,
            min_streamflow_cms: 0.0,
            archive: ArchiveConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            bucket: "noaa-nwm-pds".to_string(),
            region: "us-east-1".to_string(),
            base_url: "https://noaa-nwm-pds.s3.amazonaws.com".to_string(),
            product: "analysis_assim".to_string(),
            domain: "conus".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            bucket: "nwm-streamflow-data".to_string(),
            region: "us-east-1".to_string(),
            profile: None,
            key_prefix: "live".to_string(),
            object_name: "current_velocity.json".to_string(),
            cache_control: "max-age=300".to_string(),
            local_path: PathBuf::from("current_velocity.json"),
        }
    }
}

impl OutputConfig {
    /// Object key the snapshot is published under, e.g. `live/current_velocity.json`.
    pub fn object_key(&self) -> String {
        let prefix = self.key_prefix.trim_matches('/');
        if prefix.is_empty() {
            self.object_name.clone()
        } else {
            format!("{}/{}", prefix, self.object_name)
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parses configuration from TOML text. Missing keys take their defaults.
pub fn parse_config(contents: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads configuration from `path`, or from `DEFAULT_CONFIG_PATH` if it
/// exists, then applies environment overrides and validates.
///
/// An explicitly named file must exist; the default file is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(p) => read_config_file(p)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                read_config_file(default_path)?
            } else {
                Config::default()
            }
        }
    };

    let config = apply_env_overrides(config, |name| std::env::var(name).ok())?;
    validate(&config)?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, path)
}

/// Applies environment overrides on top of file configuration.
///
/// `lookup` abstracts the environment so tests don't mutate process state.
pub fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(bucket) = lookup("S3_BUCKET_NAME") {
        config.output.bucket = bucket;
    }
    if let Some(region) = lookup("AWS_REGION") {
        config.output.region = region;
    }
    if let Some(profile) = lookup("AWS_PROFILE").filter(|p| !p.is_empty()) {
        config.output.profile = Some(profile);
    }
    if let Some(prefix) = lookup("OUTPUT_KEY_PREFIX") {
        config.output.key_prefix = prefix;
    }
    if let Some(domain) = lookup("NWM_DOMAIN") {
        config.archive.domain = domain;
    }
    if let Some(hours) = lookup("NWM_LOOKBACK_HOURS") {
        config.lookback_hours = hours.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: "NWM_LOOKBACK_HOURS",
            value: hours.clone(),
        })?;
    }
    if let Some(min_flow) = lookup("MIN_STREAMFLOW_CMS") {
        config.min_streamflow_cms =
            min_flow.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "MIN_STREAMFLOW_CMS",
                value: min_flow.clone(),
            })?;
    }

    Ok(config)
}

/// Rejects configurations the job cannot run with.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.lookback_hours == 0 || config.lookback_hours > MAX_LOOKBACK_HOURS {
        return Err(ConfigError::InvalidValue {
            name: "lookback_hours",
            value: config.lookback_hours.to_string(),
        });
    }
    if !config.min_streamflow_cms.is_finite() || config.min_streamflow_cms < 0.0 {
        return Err(ConfigError::InvalidValue {
            name: "min_streamflow_cms",
            value: config.min_streamflow_cms.to_string(),
        });
    }
    if config.output.bucket.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            name: "output.bucket",
            value: config.output.bucket.clone(),
        });
    }
    if config.output.object_name.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            name: "output.object_name",
            value: config.output.object_name.clone(),
        });
    }
    if config.archive.bucket.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            name: "archive.bucket",
            value: config.archive.bucket.clone(),
        });
    }
    Ok(())
}
