//! Behavioural tests for the processing orchestrator.

use std::cell::RefCell;

use geoingest_core::test_support::{MemoryBlobStore, MemoryFeatureStore, StoredFeature};
use geoingest_core::{
    BlobLocation, ErrorKind, Pipeline, ProcessError, ProcessingOutcome, ValidationError,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

const ONE_POINT: &str = r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"name":"x"},"geometry":{"type":"Point","coordinates":[1,2]}}]}"#;

#[derive(Debug, Default)]
struct PipelineWorld {
    blobs: RefCell<MemoryBlobStore>,
    fail_at: RefCell<Option<usize>>,
    result: RefCell<Option<Result<ProcessingOutcome, ProcessError>>>,
    rows: RefCell<Vec<StoredFeature>>,
}

impl PipelineWorld {
    fn store_blob(&self, content: &str) {
        self.blobs.borrow_mut().insert(location(), content);
    }

    fn expect_error_kind(&self) -> ErrorKind {
        let result = self.result.borrow();
        match result.as_ref().expect("blob was processed") {
            Ok(outcome) => panic!("expected an error, got {outcome:?}"),
            Err(err) => err.kind(),
        }
    }
}

fn location() -> BlobLocation {
    BlobLocation::new("incoming", "parks.geojson")
}

#[fixture]
fn world() -> PipelineWorld {
    PipelineWorld::default()
}

#[given("a blob holding a collection with one point feature")]
fn one_point_blob(world: &PipelineWorld) {
    world.store_blob(ONE_POINT);
}

#[given("a blob holding a JSON object without a type")]
fn untyped_blob(world: &PipelineWorld) {
    world.store_blob(r#"{"features": []}"#);
}

#[given("a blob holding a collection with five features")]
fn five_feature_blob(world: &PipelineWorld) {
    let feature = r#"{"type":"Feature","properties":{},"geometry":null}"#;
    let features = vec![feature; 5].join(",");
    world.store_blob(&format!(
        r#"{{"type":"FeatureCollection","features":[{features}]}}"#
    ));
}

#[given("a store that fails on the third feature")]
fn failing_store(world: &PipelineWorld) {
    world.fail_at.replace(Some(2));
}

#[given("no blob at the requested location")]
fn no_blob(world: &PipelineWorld) {
    world.blobs.replace(MemoryBlobStore::default());
}

#[when("the blob is processed")]
fn process_blob(world: &PipelineWorld) {
    let blobs = world.blobs.take();
    let store = match *world.fail_at.borrow() {
        Some(index) => MemoryFeatureStore::default().failing_at(index),
        None => MemoryFeatureStore::default(),
    };
    let pipeline = Pipeline::new(blobs, store);
    let result = pipeline.process(&location());
    world.rows.replace(pipeline.store().rows());
    world.result.replace(Some(result));
}

#[then("one feature is persisted with type Feature")]
fn one_feature_persisted(world: &PipelineWorld) {
    let rows = world.rows.borrow();
    assert_eq!(rows.len(), 1, "expected exactly one row: {rows:?}");
    let row = rows.first().expect("one row");
    assert_eq!(row.filename, "parks.geojson");
    assert_eq!(row.record.feature_type, "Feature");
}

#[then("the document is rejected")]
fn document_rejected(world: &PipelineWorld) {
    let result = world.result.borrow();
    let outcome = result
        .as_ref()
        .expect("blob was processed")
        .as_ref()
        .expect("rejection is not an error");
    assert_eq!(outcome.rejection, Some(ValidationError::MissingType));
}

#[then("no features are persisted")]
fn nothing_persisted(world: &PipelineWorld) {
    assert!(world.rows.borrow().is_empty());
}

#[then("a persistence error is returned")]
fn persistence_error(world: &PipelineWorld) {
    assert_eq!(world.expect_error_kind(), ErrorKind::Persistence);
}

#[then("a fetch error is returned")]
fn fetch_error(world: &PipelineWorld) {
    assert_eq!(world.expect_error_kind(), ErrorKind::Fetch);
}

#[scenario(path = "tests/features/pipeline.feature", index = 0)]
fn persisting_single_feature(world: PipelineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/pipeline.feature", index = 1)]
fn stopping_on_invalid_document(world: PipelineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/pipeline.feature", index = 2)]
fn discarding_failed_batch(world: PipelineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/pipeline.feature", index = 3)]
fn reporting_missing_blob(world: PipelineWorld) {
    let _ = world;
}
