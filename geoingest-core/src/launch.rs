//! Launching isolated processing tasks.
//!
//! The dispatcher never runs the pipeline itself. It asks a [`TaskLauncher`]
//! to start an independently scheduled task with the blob location injected
//! as environment parameters.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::BlobLocation;

/// Environment variable carrying the bucket of the blob a task processes.
pub const BUCKET_ENV: &str = "S3_BUCKET";
/// Environment variable carrying the key of the blob a task processes.
pub const KEY_ENV: &str = "S3_KEY";
/// Container name used when none is configured.
pub const DEFAULT_CONTAINER_NAME: &str = "geojson-processor";

/// Network placement of launched tasks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkConfig {
    /// Subnet identifiers the task may be placed in.
    pub subnets: Vec<String>,
    /// Security group identifiers attached to the task.
    pub security_groups: Vec<String>,
    /// Whether the task receives a public IP address.
    pub assign_public_ip: bool,
}

/// Fixed launch parameters shared by every task of one dispatcher.
///
/// Read once from configuration at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTemplate {
    /// Cluster the tasks run on.
    pub cluster: String,
    /// Task definition to instantiate.
    pub task_definition: String,
    /// Container receiving the environment overrides.
    pub container_name: String,
    /// Network placement.
    pub network: NetworkConfig,
}

impl TaskTemplate {
    /// Build a template with the default container name and no network
    /// placement.
    #[must_use]
    pub fn new(cluster: impl Into<String>, task_definition: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            task_definition: task_definition.into(),
            container_name: DEFAULT_CONTAINER_NAME.to_owned(),
            network: NetworkConfig::default(),
        }
    }

    /// Produce the request that processes the blob at `location`.
    #[must_use]
    pub fn request_for(&self, location: &BlobLocation) -> LaunchRequest {
        let environment = BTreeMap::from([
            (BUCKET_ENV.to_owned(), location.bucket.clone()),
            (KEY_ENV.to_owned(), location.key.clone()),
        ]);
        LaunchRequest {
            cluster: self.cluster.clone(),
            task_definition: self.task_definition.clone(),
            container_name: self.container_name.clone(),
            network: self.network.clone(),
            environment,
        }
    }
}

/// One request to start an isolated task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Cluster the task runs on.
    pub cluster: String,
    /// Task definition to instantiate.
    pub task_definition: String,
    /// Container receiving `environment`.
    pub container_name: String,
    /// Network placement.
    pub network: NetworkConfig,
    /// Environment overrides, always including [`BUCKET_ENV`] and [`KEY_ENV`].
    pub environment: BTreeMap<String, String>,
}

/// Identifier of a launched task as reported by the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReceipt(pub String);

impl std::fmt::Display for LaunchReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from [`TaskLauncher::launch`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    /// The launcher is not configured well enough to start anything.
    #[error("task launcher is misconfigured: {message}")]
    Misconfigured {
        /// What is missing or wrong.
        message: String,
    },
    /// The launcher refused or failed to start the task.
    #[error("failed to launch task from {task_definition} on {cluster}: {message}")]
    Failed {
        /// Cluster targeted by the request.
        cluster: String,
        /// Task definition targeted by the request.
        task_definition: String,
        /// Underlying error message.
        message: String,
    },
}

/// Start isolated processing tasks.
pub trait TaskLauncher: Send + Sync {
    /// Start one task described by `request`.
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchReceipt, LaunchError>;
}

impl<T: TaskLauncher + ?Sized> TaskLauncher for Box<T> {
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchReceipt, LaunchError> {
        (**self).launch(request)
    }
}

impl<T: TaskLauncher + ?Sized> TaskLauncher for std::sync::Arc<T> {
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchReceipt, LaunchError> {
        (**self).launch(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn request_injects_location_parameters() {
        let mut template = TaskTemplate::new("ingest", "processor:3");
        template.network.subnets = vec!["subnet-a".into()];

        let request = template.request_for(&BlobLocation::new("bucket", "dir/file.geojson"));

        assert_eq!(request.cluster, "ingest");
        assert_eq!(request.container_name, DEFAULT_CONTAINER_NAME);
        assert_eq!(request.network.subnets, vec!["subnet-a".to_owned()]);
        assert_eq!(
            request.environment.get(BUCKET_ENV).map(String::as_str),
            Some("bucket")
        );
        assert_eq!(
            request.environment.get(KEY_ENV).map(String::as_str),
            Some("dir/file.geojson")
        );
        assert_eq!(request.environment.len(), 2);
    }
}
