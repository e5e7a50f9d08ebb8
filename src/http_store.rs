//! HTTP adapter for a JSON request store service.

use reqwest::StatusCode;
use reqwest::blocking::{RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::request::ServiceRequest;
use crate::traits::RequestStore;

#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequestStore {
    config: HttpStoreConfig,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct SeedResponse {
    seeded: bool,
}

impl HttpRequestStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpStoreConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().map_err(|err| {
            warn!(error = %err, "request store unreachable");
            EngineError::from(err)
        })
    }

    /// Turns any non-2xx answer into a store error.
    fn checked(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        warn!(%status, url = %response.url(), "request store rejected call");
        Err(EngineError::Store(format!("{} answered {}", response.url(), status)))
    }

    /// Maps 404 to `false`, other failures to errors.
    fn found(&self, response: Response) -> Result<bool> {
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        self.checked(response)?;
        Ok(true)
    }
}

impl RequestStore for HttpRequestStore {
    fn get_all(&self) -> Result<Vec<ServiceRequest>> {
        let response = self.send(self.client.get(self.url("requests")))?;
        let requests: Vec<ServiceRequest> = self.checked(response)?.json()?;
        debug!(count = requests.len(), "fetched request snapshot");
        Ok(requests)
    }

    fn create(&mut self, request: ServiceRequest) -> Result<u64> {
        let response = self.send(self.client.post(self.url("requests")).json(&request))?;
        let created: CreatedResponse = self.checked(response)?.json()?;
        debug!(id = created.id, "store created request");
        Ok(created.id)
    }

    fn update(&mut self, request: &ServiceRequest) -> Result<bool> {
        let url = self.url(&format!("requests/{}", request.id));
        let response = self.send(self.client.put(url).json(request))?;
        self.found(response)
    }

    fn delete(&mut self, id: u64) -> Result<bool> {
        let url = self.url(&format!("requests/{}", id));
        let response = self.send(self.client.delete(url))?;
        self.found(response)
    }

    fn ensure_seeded(&mut self) -> Result<bool> {
        let response = self.send(self.client.post(self.url("requests/seed")))?;
        let seeded: SeedResponse = self.checked(response)?.json()?;
        Ok(seeded.seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let store = HttpRequestStore::new(HttpStoreConfig {
            base_url: "http://store.local/api/".to_string(),
            timeout_secs: 1,
        })
        .unwrap();
        assert_eq!(store.url("requests/3"), "http://store.local/api/requests/3");
    }

    #[test]
    fn test_unreachable_store_is_an_error() {
        let store = HttpRequestStore::new(HttpStoreConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        })
        .unwrap();
        assert!(matches!(store.get_all(), Err(EngineError::Http(_))));
    }
}
