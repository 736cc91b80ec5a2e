//! Manifest fetcher.

use crate::core::FetchError;
use crate::http::{HttpClient, validate_url};
use crate::manifest::UpdateManifest;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retrieves and validates the remote manifest.
#[derive(Debug, Clone)]
pub struct ManifestFetcher<'a, H> {
    http: &'a H,
    allowed_hosts: &'a [String],
    timeout: Duration,
}

impl<'a, H: HttpClient> ManifestFetcher<'a, H> {
    /// Create a fetcher restricted to `allowed_hosts` (empty allows any host).
    pub const fn new(http: &'a H, allowed_hosts: &'a [String], timeout: Duration) -> Self {
        Self {
            http,
            allowed_hosts,
            timeout,
        }
    }

    /// Fetch and parse the manifest at `url`.
    ///
    /// Absent package fields are logged but tolerated; they are only required
    /// once a package is about to be applied.
    pub async fn fetch(&self, url: &str) -> Result<UpdateManifest, FetchError> {
        let url = validate_url(url, self.allowed_hosts)
            .inspect_err(|e| warn!("Rejected manifest URL: {e}"))?;
        let url = url.as_str();

        debug!("Fetching manifest from {url}");
        let response = self.http.get(url, self.timeout).await?;
        if response.status != 200 {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        let manifest = UpdateManifest::parse(url, &response.body)?;

        if let Err(e) = manifest.package_spec() {
            warn!("Manifest from {url} cannot be applied as a package: {e}");
        }
        info!(
            "Fetched manifest from {url}: display {} internal {}",
            manifest.display_version, manifest.internal_version
        );
        Ok(manifest)
    }
}
