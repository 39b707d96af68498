//! Launch each processing task as a detached local child process.
//!
//! The child receives the request's environment overrides plus the task
//! coordinates, so a `geoingest process` child picks up `S3_BUCKET` and
//! `S3_KEY` and runs one pipeline in isolation from the dispatcher.

use std::process::{Child, Command, Stdio};
use std::thread;

use geoingest_core::{LaunchError, LaunchReceipt, LaunchRequest, TaskLauncher};
use log::{info, warn};

/// Environment variable naming the cluster the task was launched on.
pub const CLUSTER_ENV: &str = "GEOINGEST_TASK_CLUSTER";
/// Environment variable naming the task definition.
pub const TASK_DEFINITION_ENV: &str = "GEOINGEST_TASK_DEFINITION";
/// Environment variable naming the container receiving the overrides.
pub const CONTAINER_ENV: &str = "GEOINGEST_TASK_CONTAINER";

/// Launcher that spawns `program args...` once per request.
///
/// `launch` returns as soon as the child is running. A background thread
/// waits on the child and logs its exit status, so finished tasks are reaped.
///
/// # Examples
/// ```no_run
/// use geoingest_core::{BlobLocation, TaskLauncher, TaskTemplate};
/// use geoingest_data::launch::ProcessTaskLauncher;
///
/// let launcher = ProcessTaskLauncher::new("geoingest").with_args(["process"]);
/// let template = TaskTemplate::new("local", "geoingest-process");
/// let receipt = launcher.launch(&template.request_for(&BlobLocation::new("b", "k.geojson")))?;
/// println!("started {receipt}");
/// # Ok::<(), geoingest_core::LaunchError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTaskLauncher {
    program: String,
    args: Vec<String>,
}

impl ProcessTaskLauncher {
    /// Launch tasks by running `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Pass `args` to every launched program.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Program started for each task.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    fn command_for(&self, request: &LaunchRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&request.environment)
            .env(CLUSTER_ENV, &request.cluster)
            .env(TASK_DEFINITION_ENV, &request.task_definition)
            .env(CONTAINER_ENV, &request.container_name)
            .stdin(Stdio::null());
        command
    }
}

fn reap(mut child: Child, receipt: LaunchReceipt) {
    let spawned = thread::Builder::new()
        .name(format!("reap-{receipt}"))
        .spawn(move || match child.wait() {
            Ok(status) if status.success() => info!("task {receipt} finished"),
            Ok(status) => warn!("task {receipt} exited with {status}"),
            Err(err) => warn!("failed to wait for task {receipt}: {err}"),
        });
    if let Err(err) = spawned {
        warn!("failed to start reaper thread: {err}");
    }
}

impl TaskLauncher for ProcessTaskLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchReceipt, LaunchError> {
        if self.program.trim().is_empty() {
            return Err(LaunchError::Misconfigured {
                message: "no task program configured".to_owned(),
            });
        }
        let child = self
            .command_for(request)
            .spawn()
            .map_err(|err| LaunchError::Failed {
                cluster: request.cluster.clone(),
                task_definition: request.task_definition.clone(),
                message: format!("failed to spawn {}: {err}", self.program),
            })?;
        let receipt = LaunchReceipt(format!(
            "{}/{}/{}",
            request.cluster,
            request.task_definition,
            child.id()
        ));
        info!("launched task {receipt} running {}", self.program);
        reap(child, receipt.clone());
        Ok(receipt)
    }
}
