// Snapshot tests: lock the text of every descriptor the plugin reads.
//
// Uses the library API (read_all → descriptor::render) on a scratch copy of
// the fixture bundle. Snapshots are managed by `insta` and stored under
// `converter/tests/snapshots/`.
//
// Run `cargo insta review` after intentional output changes to update baselines.

mod common;

use ei2gst::anchors::{self, TensorDump};
use ei2gst::descriptor::{self, DescriptorKind};
use ei2gst::pipeline::{self, ConvertOptions};
use ei2gst::table::VariableTable;

fn fixture_table(test_name: &str) -> VariableTable {
    let bundle = common::scratch_bundle(test_name, "model");
    let conversion = pipeline::read_all(ConvertOptions::new("model", &bundle))
        .unwrap_or_else(|e| panic!("fixture bundle failed to convert: {}", e));
    let table = conversion.table().clone();
    common::cleanup(&bundle);
    table
}

fn snapshot_descriptor(kind: DescriptorKind, snap_name: &str) {
    let table = fixture_table(snap_name);
    let text = descriptor::render(kind, &table)
        .unwrap_or_else(|e| panic!("cannot render {}: {}", kind.name(), e));
    assert!(!text.is_empty(), "empty {} output", kind.name());
    insta::assert_snapshot!(snap_name, text);
}

#[test]
fn snapshot_input_map() {
    snapshot_descriptor(DescriptorKind::InputMap, "input_map");
}

#[test]
fn snapshot_labels() {
    snapshot_descriptor(DescriptorKind::Labels, "labels");
}

#[test]
fn snapshot_output_map() {
    snapshot_descriptor(DescriptorKind::OutputMap, "output_map");
}

#[test]
fn snapshot_post_process() {
    snapshot_descriptor(DescriptorKind::PostProcess, "post_process");
}

#[test]
fn snapshot_anchors() {
    let table = fixture_table("anchors");
    let dump = TensorDump::load(&common::fixture_bundle().join("tensors.json"))
        .unwrap_or_else(|e| panic!("cannot load tensor dump: {}", e));
    let grids = anchors::grid_sizes(&table).unwrap();
    let text = anchors::render_anchors(&anchors::project_anchors(&dump, &grids).unwrap());
    insta::assert_snapshot!("anchors", text);
}
