//! Child listings.
//!
//! A listing is the lightweight summary a parent's own record carries for
//! each of its children: enough to display the child and fetch it later,
//! nothing more. Listings are immutable once parsed and seed newly created
//! model nodes until their first refresh succeeds.

use serde::Deserialize;
use url::Url;

use crate::object_kind::{classify, KindOverrides, ObjectKind};

/// A job or container entry in a parent's `jobs` listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobListing {
    /// The server-side class name; drives classification.
    #[serde(rename = "_class")]
    pub class_name: String,
    /// Display name before the child has been fetched.
    pub name: String,
    /// The child's URL.
    pub url: Url,
}

/// A build entry in a job's `builds` listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BuildListing {
    /// The build number.
    pub number: u32,
    /// The build's URL.
    pub url: Url,
}

/// Either kind of child listing, as handed to reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Job(JobListing),
    Build(BuildListing),
}

impl Listing {
    /// The URL of the listed child.
    pub fn url(&self) -> &Url {
        match self {
            Self::Job(l) => &l.url,
            Self::Build(l) => &l.url,
        }
    }

    /// Classify the listed child. Build listings have exactly one kind.
    pub fn kind(&self, overrides: &KindOverrides) -> ObjectKind {
        match self {
            Self::Job(l) => classify(&l.class_name, overrides),
            Self::Build(_) => ObjectKind::Build,
        }
    }
}

impl From<JobListing> for Listing {
    fn from(l: JobListing) -> Self {
        Self::Job(l)
    }
}

impl From<BuildListing> for Listing {
    fn from(l: BuildListing) -> Self {
        Self::Build(l)
    }
}
