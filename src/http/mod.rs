//! HTTP access for manifest fetches and package downloads.
//!
//! The engine only talks to the network through [`HttpClient`], so tests can
//! serve manifests and packages from memory. [`ReqwestClient`] is the
//! production implementation.

use crate::constants::USER_AGENT;
use crate::core::FetchError;
use reqwest::Url;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Status and body of a completed GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Vec<u8>,
}

/// Minimal HTTP client used by the fetcher and the package retriever.
///
/// Both requests bypass intermediate caches.
pub trait HttpClient: Send + Sync {
    /// GET `url` and return whatever the server answered.
    ///
    /// Only transport failures are errors; non-200 statuses are returned.
    fn get(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<HttpResponse, FetchError>> + Send;

    /// Stream the body of `url` into `dest`, returning the number of bytes written.
    ///
    /// Any status other than 200 is a [`FetchError::Status`]. A partially
    /// written `dest` is removed on failure.
    fn download_to(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
    ) -> impl Future<Output = Result<u64, FetchError>> + Send;
}

/// Check that `url` is http(s) and, when an allow-list is given, that its host
/// is on it.
///
/// An allow-list entry starting with `.` matches the bare domain and every
/// subdomain (`.example.com` allows `example.com` and `cdn.example.com`).
pub fn validate_url(url: &str, allowed_hosts: &[String]) -> Result<Url, FetchError> {
    let invalid = |reason: &str| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(url.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("only http and https are supported"));
    }
    let host = parsed.host_str().ok_or_else(|| invalid("URL has no host"))?.to_ascii_lowercase();

    if allowed_hosts.is_empty() {
        return Ok(parsed);
    }

    let allowed = allowed_hosts.iter().any(|entry| {
        let entry = entry.trim().to_ascii_lowercase();
        match entry.strip_prefix('.') {
            Some(domain) => host == domain || host.ends_with(&format!(".{domain}")),
            None => host == entry,
        }
    });

    if allowed {
        Ok(parsed)
    } else {
        Err(FetchError::HostNotAllowed {
            host,
        })
    }
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Build a client with the crate's user agent.
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
        })
    }

    async fn send(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, FetchError> {
        self.client
            .get(url)
            .timeout(timeout)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| transport(url, &e))
    }
}

fn transport(url: &str, error: &reqwest::Error) -> FetchError {
    let reason = if error.is_timeout() {
        "request timed out".to_string()
    } else {
        error.to_string()
    };
    FetchError::Transport {
        url: url.to_string(),
        reason,
    }
}

impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, FetchError> {
        let response = self.send(url, timeout).await?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| transport(url, &e))?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }

    async fn download_to(&self, url: &str, dest: &Path, timeout: Duration) -> Result<u64, FetchError> {
        let mut response = self.send(url, timeout).await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let io_error = |e: std::io::Error| FetchError::Transport {
            url: url.to_string(),
            reason: format!("failed to write {}: {e}", dest.display()),
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(io_error)?;
        let mut written = 0u64;
        let result: Result<(), FetchError> = async {
            while let Some(chunk) = response.chunk().await.map_err(|e| transport(url, &e))? {
                file.write_all(&chunk).await.map_err(io_error)?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(io_error)?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(e);
        }

        if written == 0 {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }
        Ok(written)
    }
}
