//! Full object records fetched from the remote API.
//!
//! One record type per object kind. Deserialization is strict about the
//! fields we rely on and ignores everything else the server tacks on; a
//! record that fails to parse is treated by callers exactly like a failed
//! fetch, leaving any previously mirrored data intact.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use url::Url;

use crate::listing::{BuildListing, JobListing};

/// Data for a server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    #[serde(default)]
    pub description: Option<String>,
    pub node_name: String,
    #[serde(default)]
    pub node_description: Option<String>,
    /// Listings for the jobs at the server root.
    pub jobs: Vec<JobListing>,
    pub url: Url,
}

/// Data for a job container (folder, multibranch project, organization).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    #[serde(default)]
    pub description: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub full_display_name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    pub name: String,
    /// Listings for the contained jobs.
    pub jobs: Vec<JobListing>,
    pub url: Url,
}

/// One entry of a job's health report.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub score: i64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Data for a job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub buildable: bool,
    /// Listings for the job's builds, possibly empty.
    pub builds: Vec<BuildListing>,
    /// The status color reported for the job's most recent build.
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub full_display_name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub health_report: Vec<HealthReport>,
    pub name: String,
    pub url: Url,
}

/// The status of a job, derived from its reported color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// The last build was aborted.
    Aborted,
    /// The last build succeeded.
    Succeeded,
    /// The job has never been built.
    NotBuilt,
    /// The last build failed.
    Failed,
    /// The last build was unstable.
    Unstable,
    /// The color was not recognized.
    Unknown,
}

impl JobRecord {
    /// The job status derived from the color string.
    pub fn status(&self) -> JobStatus {
        match self.color.as_str() {
            "aborted" => JobStatus::Aborted,
            "blue" | "blue_anime" => JobStatus::Succeeded,
            "notbuilt" => JobStatus::NotBuilt,
            "red" | "red_anime" => JobStatus::Failed,
            "yellow" | "yellow_anime" => JobStatus::Unstable,
            _ => JobStatus::Unknown,
        }
    }

    /// The worst health-report score for the job, 100 when none reported.
    pub fn health(&self) -> i64 {
        self.health_report.iter().map(|h| h.score).min().unwrap_or(100)
    }
}

/// Data for a single build.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    /// True while the build is still running.
    pub building: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Elapsed milliseconds, 0 while building.
    pub duration: u64,
    pub estimated_duration: u64,
    pub id: String,
    pub number: u32,
    /// Final result string, absent while building.
    #[serde(default)]
    pub result: Option<String>,
    /// Start time in milliseconds since the epoch.
    pub timestamp: i64,
    pub url: Url,
}

/// The outcome of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Still running.
    Building,
    Succeeded,
    Failed,
    Aborted,
    /// Finished with a degraded result, usually failed tests.
    Unstable,
}

impl BuildRecord {
    /// The build's outcome. Finished builds with an unrecognized result
    /// count as unstable.
    pub fn outcome(&self) -> BuildOutcome {
        if self.building {
            return BuildOutcome::Building;
        }
        match self.result.as_deref() {
            Some("SUCCESS") => BuildOutcome::Succeeded,
            Some("FAILURE") => BuildOutcome::Failed,
            Some("ABORTED") => BuildOutcome::Aborted,
            _ => BuildOutcome::Unstable,
        }
    }

    /// The build's start time.
    pub fn started_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}
