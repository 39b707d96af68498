//! `TaskLauncher` adapters.

mod process;

pub use process::{CLUSTER_ENV, CONTAINER_ENV, ProcessTaskLauncher, TASK_DEFINITION_ENV};
