//! In-memory [`HttpClient`].

use crate::core::FetchError;
use crate::http::{HttpClient, HttpResponse};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Routes {
    responses: HashMap<String, HttpResponse>,
    requests: Vec<String>,
}

/// Serves registered responses by exact URL. Unknown URLs fail as a
/// transport error. Clones share their routes.
#[derive(Debug, Clone, Default)]
pub struct FakeHttp {
    routes: Arc<Mutex<Routes>>,
}

impl FakeHttp {
    /// Client with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer GETs of `url` with `status` and `body`, replacing any earlier route.
    pub fn serve(&self, url: &str, status: u16, body: &[u8]) {
        self.routes.lock().unwrap().responses.insert(
            url.to_string(),
            HttpResponse {
                status,
                body: body.to_vec(),
            },
        );
    }

    /// Number of requests made so far.
    pub fn request_count(&self) -> usize {
        self.routes.lock().unwrap().requests.len()
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.routes.lock().unwrap().requests.clone()
    }

    fn respond(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let mut routes = self.routes.lock().unwrap();
        routes.requests.push(url.to_string());
        routes.responses.get(url).cloned().ok_or_else(|| FetchError::Transport {
            url: url.to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

impl HttpClient for FakeHttp {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, FetchError> {
        self.respond(url)
    }

    async fn download_to(&self, url: &str, dest: &Path, _timeout: Duration) -> Result<u64, FetchError> {
        let response = self.respond(url)?;
        if response.status != 200 {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        if response.body.is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }
        tokio::fs::write(dest, &response.body).await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(response.body.len() as u64)
    }
}
