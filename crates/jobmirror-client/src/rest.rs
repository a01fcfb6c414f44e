//! REST implementation of the remote-service seam.
//!
//! Every object URL reported by the server doubles as its API endpoint
//! once `api/json` is appended. Requests carry basic auth when the
//! credential store has an entry for the server; transport and HTTP-status
//! failures map to fetch errors, undecodable bodies to malformed ones, so
//! the model records a useful message either way.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

use jobmirror_model::{ModelError, RemoteService};
use jobmirror_protocol::{BuildRecord, ContainerRecord, JobRecord, ServerRecord};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A username and API token pair for basic auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub api_token: String,
}

/// Looks up the credentials to use for a given object URL.
pub trait CredentialStore: Send + Sync {
    /// Credentials for the server owning `url`, `None` for anonymous
    /// access.
    fn credentials_for(&self, url: &Url) -> Option<Credentials>;
}

/// Credential store backed by the `JOBMIRROR_USER` and `JOBMIRROR_TOKEN`
/// environment variables, applied to every server.
#[derive(Debug, Default)]
pub struct EnvCredentials;

impl CredentialStore for EnvCredentials {
    fn credentials_for(&self, _url: &Url) -> Option<Credentials> {
        let username = std::env::var("JOBMIRROR_USER").ok()?;
        let api_token = std::env::var("JOBMIRROR_TOKEN").ok()?;
        Some(Credentials { username, api_token })
    }
}

/// [`RemoteService`] over HTTP.
pub struct RestClient {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
}

impl RestClient {
    /// Build a client with its own connection pool.
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, credentials })
    }

    /// The JSON API endpoint for an object URL.
    fn api_url(url: &Url) -> Result<Url, ModelError> {
        Self::slash_terminated(url)
            .join("api/json")
            .map_err(|e| ModelError::Fetch(format!("bad object url {url}: {e}")))
    }

    /// The trigger endpoint for a job URL.
    fn build_url(url: &Url) -> Result<Url, ModelError> {
        Self::slash_terminated(url)
            .join("build")
            .map_err(|e| ModelError::Fetch(format!("bad job url {url}: {e}")))
    }

    /// Joining relative to a path without a trailing slash would drop the
    /// last segment. Server-reported URLs always carry one; user-entered
    /// URLs such as a context path get one appended here.
    fn slash_terminated(url: &Url) -> Url {
        if url.path().ends_with('/') {
            return url.clone();
        }
        let mut url = url.clone();
        let path = format!("{}/", url.path());
        url.set_path(&path);
        url
    }

    fn authorize(&self, req: reqwest::RequestBuilder, url: &Url) -> reqwest::RequestBuilder {
        match self.credentials.credentials_for(url) {
            Some(c) => req.basic_auth(c.username, Some(c.api_token)),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ModelError> {
        let endpoint = Self::api_url(url)?;
        tracing::debug!(url = %endpoint, "GET");
        let response = self
            .authorize(self.http.get(endpoint.clone()), url)
            .send()
            .await
            .map_err(|e| ModelError::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| ModelError::Fetch(e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Fetch(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| ModelError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl RemoteService for RestClient {
    async fn fetch_server(&self, url: &Url) -> Result<ServerRecord, ModelError> {
        self.get(url).await
    }

    async fn fetch_container(&self, url: &Url) -> Result<ContainerRecord, ModelError> {
        self.get(url).await
    }

    async fn fetch_job(&self, url: &Url) -> Result<JobRecord, ModelError> {
        self.get(url).await
    }

    async fn fetch_build(&self, url: &Url) -> Result<BuildRecord, ModelError> {
        self.get(url).await
    }

    async fn trigger_build(&self, url: &Url) -> Result<(), ModelError> {
        let endpoint = Self::build_url(url)?;
        tracing::debug!(url = %endpoint, "POST");
        self.authorize(self.http.post(endpoint), url)
            .send()
            .await
            .map_err(|e| ModelError::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| ModelError::Fetch(e.to_string()))?;
        Ok(())
    }
}
