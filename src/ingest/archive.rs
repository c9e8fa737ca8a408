/// Access to the NOAA NWM archive on S3.
///
/// Listing goes through an anonymous S3 `ListObjectsV2` client, the body
/// download is a plain HTTPS GET against the bucket's public endpoint:
///   https://noaa-nwm-pds.s3.amazonaws.com/<key>
///
/// The `Archive` trait is the seam the locator and job work against, so
/// tests can swap in an in-memory archive.

use std::time::Duration;

use aws_config::{BehaviorVersion, Region};

use crate::config::ArchiveConfig;
use crate::model::SourceError;

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// File-list / file-fetch view of an upstream archive.
pub trait Archive {
    /// All object keys under `prefix`, unsorted.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, SourceError>;

    /// Full body of the object at `key`.
    fn fetch(&self, key: &str) -> Result<Vec<u8>, SourceError>;

    /// Public URL for `key`, for logging and reporting.
    fn object_url(&self, key: &str) -> String;
}

// ---------------------------------------------------------------------------
// S3-backed archive
// ---------------------------------------------------------------------------

/// Anonymous client for the public NWM bucket.
pub struct NwmArchive {
    runtime: tokio::runtime::Runtime,
    s3: aws_sdk_s3::Client,
    http: reqwest::blocking::Client,
    bucket: String,
    base_url: String,
}

impl NwmArchive {
    /// Builds the S3 and HTTP clients. No network traffic happens here.
    pub fn new(config: &ArchiveConfig) -> Result<Self, SourceError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        // The bucket is public; unsigned requests only
        let sdk_config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(config.region.clone()))
                .no_credentials()
                .load(),
        );

        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            runtime,
            s3: aws_sdk_s3::Client::new(&sdk_config),
            http,
            bucket: config.bucket.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Archive for NwmArchive {
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, SourceError> {
        log::debug!("Listing s3://{}/{}*", self.bucket, prefix);

        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.s3.list_objects_v2().bucket(&self.bucket).prefix(prefix);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let output = self
                .runtime
                .block_on(request.send())
                .map_err(|e| SourceError::Listing {
                    bucket: self.bucket.clone(),
                    prefix: prefix.to_string(),
                    source: Box::new(e),
                })?;

            for obj in output.contents() {
                if let Some(key) = obj.key() {
                    keys.push(key.to_string());
                }
            }

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(String::from);
            } else {
                break;
            }
        }

        log::debug!("  found {} objects", keys.len());
        Ok(keys)
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, SourceError> {
        let url = self.object_url(key);
        log::info!("Downloading {}", url);

        let response = self.http.get(&url).send()?;

        if !response.status().is_success() {
            return Err(SourceError::Http {
                url,
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes()?.to_vec();
        log::info!("Downloaded {:.1} MB", body.len() as f64 / 1_048_576.0);

        Ok(body)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
