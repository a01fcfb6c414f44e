//! Classification of remote class names into object kinds.
//!
//! The server reports an opaque `_class` string on every listing entry.
//! A built-in table covers the class names we know about; everything else
//! can be promoted by the operator through the override sets, and whatever
//! remains classifies as [`ObjectKind::Unknown`] so it still shows up as a
//! placeholder instead of disappearing.

use serde::{Deserialize, Serialize};

/// The kinds of objects the model can mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// The local aggregate above all configured servers.
    Root,
    /// A CI server.
    Server,
    /// A container of jobs (folder, multibranch project, organization).
    JobContainer,
    /// A job with builds.
    Job,
    /// A single build of a job.
    Build,
    /// A class name no table recognizes; mirrored as a placeholder.
    Unknown,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Root => "root",
            Self::Server => "server",
            Self::JobContainer => "job-container",
            Self::Job => "job",
            Self::Build => "build",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// User-maintained class-name override sets.
///
/// Invariant: a class name appears in at most one of the two sets. Forcing
/// a name into one set removes it from the other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindOverrides {
    /// Class names treated as jobs in addition to the built-in table.
    #[serde(default)]
    pub extra_job_classes: Vec<String>,
    /// Class names treated as job containers in addition to the built-in table.
    #[serde(default)]
    pub extra_container_classes: Vec<String>,
}

impl KindOverrides {
    /// Force `class_name` to classify as a job.
    ///
    /// Removes the name from the container set if present. Returns false if
    /// the name was already in the job set.
    pub fn force_job(&mut self, class_name: &str) -> bool {
        self.extra_container_classes.retain(|c| c != class_name);
        if self.extra_job_classes.iter().any(|c| c == class_name) {
            return false;
        }
        self.extra_job_classes.push(class_name.to_string());
        true
    }

    /// Force `class_name` to classify as a job container.
    ///
    /// Removes the name from the job set if present. Returns false if the
    /// name was already in the container set.
    pub fn force_container(&mut self, class_name: &str) -> bool {
        self.extra_job_classes.retain(|c| c != class_name);
        if self.extra_container_classes.iter().any(|c| c == class_name) {
            return false;
        }
        self.extra_container_classes.push(class_name.to_string());
        true
    }

    /// Remove `class_name` from both override sets.
    ///
    /// Returns true if it was present in either.
    pub fn clear(&mut self, class_name: &str) -> bool {
        let before = self.extra_job_classes.len() + self.extra_container_classes.len();
        self.extra_job_classes.retain(|c| c != class_name);
        self.extra_container_classes.retain(|c| c != class_name);
        before != self.extra_job_classes.len() + self.extra_container_classes.len()
    }
}

/// Classify a remote class name.
///
/// Priority: built-in table, then the force-container set, then the
/// force-job set, else [`ObjectKind::Unknown`].
pub fn classify(class_name: &str, overrides: &KindOverrides) -> ObjectKind {
    match class_name {
        "hudson.model.Hudson" => ObjectKind::Server,
        "jenkins.branch.OrganizationFolder"
        | "org.jenkinsci.plugins.workflow.multibranch.WorkflowMultiBranchProject"
        | "com.cloudbees.hudson.plugins.folder.Folder" => ObjectKind::JobContainer,
        "org.jenkinsci.plugins.workflow.job.WorkflowJob" => ObjectKind::Job,
        "org.jenkinsci.plugins.workflow.job.WorkflowRun" => ObjectKind::Build,
        _ => {
            if overrides.extra_container_classes.iter().any(|c| c == class_name) {
                ObjectKind::JobContainer
            } else if overrides.extra_job_classes.iter().any(|c| c == class_name) {
                ObjectKind::Job
            } else {
                ObjectKind::Unknown
            }
        }
    }
}
