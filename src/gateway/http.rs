//! schema-repo REST gateway
//!
//! Endpoints, relative to the repository base URL
//! (e.g. `http://localhost:2876/schema-repo`):
//!
//! | call | request | response |
//! |---|---|---|
//! | list subjects | `GET {base}` | subject names, one per line |
//! | create subject | `PUT {base}/{subject}` (empty form body) | subject name |
//! | register version | `PUT {base}/{subject}/register` (schema as `text/plain`) | version id |
//!
//! Every request carries the configured timeout, so a hung registry surfaces
//! as [`GatewayError::Network`] instead of blocking the run forever.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{StatusCode, Url};

use super::{GatewayError, RegistryGateway, SubjectHandle, VersionId};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking client for a schema-repo server
#[derive(Debug, Clone)]
pub struct SchemaRepoClient {
    client: Client,
    base_url: Url,
}

impl SchemaRepoClient {
    /// Client with the default timeout
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| GatewayError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/{segments...}`, each segment percent-encoded on its own
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<String, GatewayError> {
        let response = request
            .header(ACCEPT, "text/plain")
            .send()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        read_body(response)
    }
}

fn read_body(response: Response) -> Result<String, GatewayError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| GatewayError::Network(e.to_string()))?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(status_error(status, body.trim().to_string()))
    }
}

/// Map a non-success status to a gateway error
fn status_error(status: StatusCode, message: String) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED => GatewayError::Unauthorized(message),
        StatusCode::NOT_FOUND => GatewayError::NotFound(message),
        StatusCode::CONFLICT => GatewayError::AlreadyExists(message),
        s if s.is_client_error() => GatewayError::Rejected {
            status: s.as_u16(),
            message,
        },
        s => GatewayError::Api {
            status: s.as_u16(),
            message,
        },
    }
}

impl RegistryGateway for SchemaRepoClient {
    fn list_subjects(&self) -> Result<Vec<SubjectHandle>, GatewayError> {
        let body = self.send(self.client.get(self.base_url.clone()))?;
        Ok(body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(SubjectHandle::new)
            .collect())
    }

    fn create_subject(&self, name: &str) -> Result<SubjectHandle, GatewayError> {
        let url = self.url(&[name])?;
        let request = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("");
        self.send(request)?;
        tracing::debug!(subject = %name, "Created subject");
        Ok(SubjectHandle::new(name))
    }

    fn register_version(
        &self,
        subject: &SubjectHandle,
        content: &str,
    ) -> Result<VersionId, GatewayError> {
        let url = self.url(&[subject.name(), "register"])?;
        let request = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "text/plain")
            .body(content.to_string());
        let body = self.send(request)?;
        Ok(VersionId::new(body.trim()))
    }
}
