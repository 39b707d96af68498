//! `dispatch` command: feed an arrival event file to the dispatcher.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use geoingest_core::{
    DEFAULT_CONTAINER_NAME, DispatchResponse, Dispatcher, NetworkConfig, TaskLauncher,
    TaskTemplate,
};
use geoingest_data::ProcessTaskLauncher;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ARG_ASSIGN_PUBLIC_IP, ARG_CLUSTER, ARG_CONTAINER_NAME, ARG_EVENT, ARG_SECURITY_GROUPS,
    ARG_SUBNETS, ARG_TASK_DEFINITION, ARG_TASK_PROGRAM, CliError, ENV_DISPATCH_CLUSTER,
    ENV_DISPATCH_EVENT, ENV_DISPATCH_TASK_DEFINITION,
};

/// Program launched per task when none is configured.
const DEFAULT_TASK_PROGRAM: &str = "geoingest";

/// CLI arguments for the `dispatch` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "dispatch",
    long_about = "Read an object-arrival event from a JSON file and launch \
                 one processing task per GeoJSON object it names. Each task \
                 runs the task program with S3_BUCKET and S3_KEY set.",
    about = "Launch processing tasks for an arrival event"
)]
#[ortho_config(prefix = "GEOINGEST")]
pub(crate) struct DispatchArgs {
    /// Path to the arrival event JSON.
    #[arg(value_name = ARG_EVENT)]
    #[serde(default)]
    pub(crate) event: Option<Utf8PathBuf>,
    /// Cluster the tasks run on.
    #[arg(long = ARG_CLUSTER, value_name = "name")]
    #[serde(default)]
    pub(crate) cluster: Option<String>,
    /// Task definition to instantiate.
    #[arg(long = ARG_TASK_DEFINITION, value_name = "name")]
    #[serde(default)]
    pub(crate) task_definition: Option<String>,
    /// Container receiving the environment overrides.
    #[arg(long = ARG_CONTAINER_NAME, value_name = "name")]
    #[serde(default)]
    pub(crate) container_name: Option<String>,
    /// Comma-separated subnet identifiers.
    #[arg(long = ARG_SUBNETS, value_name = "ids")]
    #[serde(default)]
    pub(crate) subnets: Option<String>,
    /// Comma-separated security group identifiers.
    #[arg(long = ARG_SECURITY_GROUPS, value_name = "ids")]
    #[serde(default)]
    pub(crate) security_groups: Option<String>,
    /// Give launched tasks a public IP address.
    #[arg(long = ARG_ASSIGN_PUBLIC_IP, value_name = "bool")]
    #[serde(default)]
    pub(crate) assign_public_ip: Option<bool>,
    /// Program started for each task; defaults to this executable.
    #[arg(long = ARG_TASK_PROGRAM, value_name = "path")]
    #[serde(default)]
    pub(crate) task_program: Option<String>,
}

impl DispatchArgs {
    pub(crate) fn into_config(self) -> Result<DispatchConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        DispatchConfig::try_from(merged)
    }
}

/// Resolved `dispatch` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DispatchConfig {
    pub(crate) event: Utf8PathBuf,
    pub(crate) template: TaskTemplate,
    pub(crate) task_program: String,
}

impl TryFrom<DispatchArgs> for DispatchConfig {
    type Error = CliError;

    fn try_from(args: DispatchArgs) -> Result<Self, Self::Error> {
        let event = args.event.ok_or(CliError::MissingArgument {
            field: ARG_EVENT,
            env: ENV_DISPATCH_EVENT,
        })?;
        let cluster = args.cluster.ok_or(CliError::MissingArgument {
            field: ARG_CLUSTER,
            env: ENV_DISPATCH_CLUSTER,
        })?;
        let task_definition = args.task_definition.ok_or(CliError::MissingArgument {
            field: ARG_TASK_DEFINITION,
            env: ENV_DISPATCH_TASK_DEFINITION,
        })?;
        let template = TaskTemplate {
            cluster,
            task_definition,
            container_name: args
                .container_name
                .unwrap_or_else(|| DEFAULT_CONTAINER_NAME.to_owned()),
            network: NetworkConfig {
                subnets: split_list(args.subnets.as_deref()),
                security_groups: split_list(args.security_groups.as_deref()),
                assign_public_ip: args.assign_public_ip.unwrap_or(false),
            },
        };
        Ok(Self {
            event,
            template,
            task_program: args.task_program.unwrap_or_else(current_program),
        })
    }
}

/// Split a comma-separated list, dropping blank entries.
pub(crate) fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn current_program() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.to_str().map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_TASK_PROGRAM.to_owned())
}

pub(crate) fn run_dispatch(args: DispatchArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let launcher = ProcessTaskLauncher::new(config.task_program.clone());
    let mut stdout = std::io::stdout().lock();
    run_dispatch_with(&config, Box::new(launcher), &mut stdout)
}

pub(crate) fn run_dispatch_with(
    config: &DispatchConfig,
    launcher: Box<dyn TaskLauncher>,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let event = load_event(&config.event)?;
    let dispatcher = Dispatcher::new(config.template.clone(), launcher);
    let response = dispatcher.on_arrival(&event);
    write_response(writer, &response)?;
    if response.is_success() {
        info!("dispatched event from {}", config.event);
        Ok(())
    } else {
        Err(CliError::DispatchFailed {
            status: response.status_code,
            body: response.body,
        })
    }
}

/// Read an arrival event from `path`.
pub(crate) fn load_event(path: &Utf8Path) -> Result<Value, CliError> {
    let text = geoingest_fs::read_utf8_file(path).map_err(|source| CliError::ReadEvent {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::ParseEvent {
        path: path.to_path_buf(),
        source,
    })
}

fn write_response(writer: &mut dyn Write, response: &DispatchResponse) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(response).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}
