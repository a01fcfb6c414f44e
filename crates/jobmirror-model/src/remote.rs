//! The remote data service seam.
//!
//! The model consumes remote data exclusively through this trait; the
//! transport, response parsing, and credential handling live behind it.

use async_trait::async_trait;
use url::Url;

use jobmirror_protocol::{BuildRecord, ContainerRecord, JobRecord, ServerRecord};

use crate::error::ModelError;

/// Fetches object records from the remote server.
///
/// Every fetch fails with a [`ModelError`] carrying a human-readable
/// message; the node layer records the message and does not interpret
/// error causes further.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Fetch the record for a server.
    async fn fetch_server(&self, url: &Url) -> Result<ServerRecord, ModelError>;

    /// Fetch the record for a job container.
    async fn fetch_container(&self, url: &Url) -> Result<ContainerRecord, ModelError>;

    /// Fetch the record for a job.
    async fn fetch_job(&self, url: &Url) -> Result<JobRecord, ModelError>;

    /// Fetch the record for a build.
    async fn fetch_build(&self, url: &Url) -> Result<BuildRecord, ModelError>;

    /// Fire-and-forget trigger of a new build for the job at `url`.
    async fn trigger_build(&self, url: &Url) -> Result<(), ModelError>;
}
