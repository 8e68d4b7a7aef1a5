//! Release metadata endpoint.
//!
//! Once a production build is registered, the metadata endpoint knows the channel URL the
//! release is served from. The lookup is best-effort; callers downgrade failures to warnings.

use crate::error::{BuildError, Result};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of per-release metadata
pub trait ReleaseMetadata {
    /// Channel URL published at `metadata_url`
    fn channel_url(&self, metadata_url: &str) -> impl Future<Output = Result<String>>;
}

#[derive(Debug, Deserialize)]
struct MetadataDocument {
    channel_url: String,
}

/// HTTP client for the metadata endpoint
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
}

impl MetadataClient {
    /// Create a client with the default request timeout
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder().timeout(METADATA_TIMEOUT).build()?;
        Ok(Self { http })
    }
}

impl ReleaseMetadata for MetadataClient {
    async fn channel_url(&self, metadata_url: &str) -> Result<String> {
        log::debug!("GET {metadata_url}");
        let response = self.http.get(metadata_url).send().await?.error_for_status()?;
        let doc: MetadataDocument = response.json().await.map_err(|e| BuildError::InvalidResponse {
            url: metadata_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(doc.channel_url)
    }
}

/// Expand a metadata URL template with `{version}`, `{branch}` and `{release_id}`
pub fn metadata_url(template: &str, version: &str, branch: &str, release_id: &str) -> String {
    crate::steps::expand_template(
        template,
        &[("version", version), ("branch", branch), ("release_id", release_id)],
    )
}
