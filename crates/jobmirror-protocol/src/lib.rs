//! JobMirror protocol types.
//!
//! The data shapes exchanged with a remote CI server: full object records,
//! the lightweight child listings embedded in them, and the mapping from
//! the server's opaque class names to the closed set of object kinds the
//! model knows how to mirror.

pub mod listing;
pub mod object_kind;
pub mod records;

pub use listing::{BuildListing, JobListing, Listing};
pub use object_kind::{classify, KindOverrides, ObjectKind};
pub use records::{
    BuildOutcome,
    BuildRecord,
    ContainerRecord,
    HealthReport,
    JobRecord,
    JobStatus,
    ServerRecord,
};
