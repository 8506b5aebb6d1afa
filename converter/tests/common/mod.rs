// Shared helpers for integration tests.
//
// Conversions write into `<working_dir>/<model>`, so every test copies the
// fixture bundle into its own scratch directory first.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub fn fixture_bundle() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/bundle")
}

fn copy_tree(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), &target).unwrap();
        }
    }
}

/// Fresh copy of the fixture bundle with the output directory for `model`
/// already created.
pub fn scratch_bundle(test_name: &str, model: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ei2gst_it_{}", test_name));
    let _ = std::fs::remove_dir_all(&dir);
    copy_tree(&fixture_bundle(), &dir);
    std::fs::create_dir_all(dir.join(model)).unwrap();
    dir
}

/// Replace `from` with `to` in one file of a scratch bundle.
pub fn patch(bundle: &Path, relative: &str, from: &str, to: &str) {
    let path = bundle.join(relative);
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains(from), "{} does not contain {:?}", relative, from);
    std::fs::write(&path, text.replacen(from, to, 1)).unwrap();
}

pub fn cleanup(dir: &Path) {
    std::fs::remove_dir_all(dir).ok();
}
