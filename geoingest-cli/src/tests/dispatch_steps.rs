//! Behaviour-driven step definitions for the dispatch command.

use super::helpers::{Workspace, arrival_event};
use super::*;
use crate::dispatch::{DispatchConfig, run_dispatch_with};
use geoingest_core::test_support::RecordingLauncher;
use geoingest_core::{DispatchResponse, TaskTemplate};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use std::sync::Arc;

struct DispatchWorld {
    workspace: Workspace,
    event: RefCell<Option<camino::Utf8PathBuf>>,
    launcher: RefCell<Arc<RecordingLauncher>>,
    output: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<(), CliError>>>,
}

#[fixture]
fn world() -> DispatchWorld {
    DispatchWorld {
        workspace: Workspace::new(),
        event: RefCell::new(None),
        launcher: RefCell::new(Arc::new(RecordingLauncher::default())),
        output: RefCell::new(Vec::new()),
        result: RefCell::new(None),
    }
}

#[given("an event file naming parks.geojson and notes.txt")]
fn geojson_and_text_event(world: &DispatchWorld) {
    let path = world
        .workspace
        .write_file("event.json", &arrival_event(&["parks.geojson", "notes.txt"]));
    world.event.replace(Some(path));
}

#[given("an event file holding plain text")]
fn plain_text_event(world: &DispatchWorld) {
    let path = world.workspace.write_file("event.json", "not json");
    world.event.replace(Some(path));
}

#[given("a launcher that refuses every task")]
fn refusing_launcher(world: &DispatchWorld) {
    world
        .launcher
        .replace(Arc::new(RecordingLauncher::default().failing_after(0)));
}

#[when("I dispatch the event file")]
fn dispatch_event_file(world: &DispatchWorld) {
    let config = DispatchConfig {
        event: world.event.borrow().clone().expect("event file written"),
        template: TaskTemplate::new("local", "geoingest-process"),
        task_program: "geoingest".to_owned(),
    };
    let launcher = Arc::clone(&world.launcher.borrow());
    let mut output = world.output.borrow_mut();
    let result = run_dispatch_with(&config, Box::new(launcher), &mut *output);
    world.result.replace(Some(result));
}

#[then("{count} task is launched")]
fn tasks_launched(world: &DispatchWorld, count: usize) {
    let requests = world.launcher.borrow().requests();
    assert_eq!(requests.len(), count, "requests: {requests:?}");
}

#[then("the printed status is {status}")]
fn printed_status(world: &DispatchWorld, status: u16) {
    let response: DispatchResponse =
        serde_json::from_slice(&world.output.borrow()).expect("printed response is JSON");
    assert_eq!(response.status_code, status, "body: {}", response.body);
}

#[then("the command fails with status {status}")]
fn fails_with_status(world: &DispatchWorld, status: u16) {
    let result = world.result.borrow();
    match result.as_ref().expect("command ran") {
        Err(CliError::DispatchFailed { status: actual, .. }) => assert_eq!(*actual, status),
        other => panic!("expected a dispatch failure, got {other:?}"),
    }
}

#[then("the command reports an unreadable event")]
fn reports_unreadable_event(world: &DispatchWorld) {
    let result = world.result.borrow();
    assert!(
        matches!(result.as_ref(), Some(Err(CliError::ParseEvent { .. }))),
        "unexpected result {result:?}"
    );
    assert!(world.output.borrow().is_empty());
}

macro_rules! register_scenario {
    ($fn_name:ident, $title:literal) => {
        #[scenario(path = "tests/features/dispatch_command.feature", name = $title)]
        fn $fn_name(world: DispatchWorld) {
            let _ = world;
        }
    };
}

register_scenario!(launching_geojson_only, "launching tasks for GeoJSON objects only");
register_scenario!(failing_when_refused, "failing when the launcher refuses");
register_scenario!(rejecting_non_json_event, "rejecting an event file that is not JSON");
