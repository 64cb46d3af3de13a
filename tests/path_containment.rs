//! Property-based tests: import never writes outside the project directory

use std::fs;
use std::path::Path;

use codeshare::engine::Engine;
use codeshare::parser::validate_import_path;
use codeshare::safe_writer::SafeWriter;
use proptest::prelude::*;
use tempfile::tempdir;

fn traversal_path() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[a-z]{1,8}", 0..4),
        prop::collection::vec("[a-z]{1,8}", 1..4),
        prop::bool::ANY,
    )
        .prop_map(|(before, after, backslash)| {
            let mut segments = before;
            segments.push("..".to_string());
            segments.push("..".to_string());
            segments.extend(after);
            segments.join(if backslash { "\\" } else { "/" })
        })
}

fn rooted_path() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["/", "\\", "C:/", "c:\\", "//server/share/"]),
        prop::collection::vec("[a-z]{1,8}", 1..4),
    )
        .prop_map(|(root, segments)| format!("{}{}", root, segments.join("/")))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_traversal_rejected_by_validation(path in traversal_path()) {
        prop_assert!(validate_import_path(&path).is_err());
    }

    #[test]
    fn test_rooted_rejected_by_validation(path in rooted_path()) {
        prop_assert!(validate_import_path(&path).is_err());
    }

    #[test]
    fn test_traversal_rejected_by_writer(path in traversal_path()) {
        let outer = tempdir().unwrap();
        let base = outer.path().join("a").join("b").join("proj");
        fs::create_dir_all(&base).unwrap();

        let writer = SafeWriter::new(&base).unwrap();
        let unified = path.replace('\\', "/");
        prop_assert!(writer.write(Path::new(&unified), "x").is_err());

        // Nothing may appear anywhere below the scratch directory except the base
        let stray = walk_files(outer.path());
        prop_assert!(stray.is_empty(), "unexpected files: {:?}", stray);
    }

    #[test]
    fn test_import_of_hostile_markers_writes_nothing(path in traversal_path()) {
        let outer = tempdir().unwrap();
        let base = outer.path().join("proj");
        fs::create_dir(&base).unwrap();

        let doc = format!(
            "// === Start File: {p} ===\n\npayload\n\n// === End File: {p} ===\n",
            p = path
        );
        let summary = Engine::default().import(&base, &doc, false).unwrap();
        prop_assert_eq!(summary.imported, 0);
        prop_assert_eq!(summary.skipped, 1);
        prop_assert!(walk_files(outer.path()).is_empty());
    }

    #[test]
    fn test_plain_relative_paths_stay_inside(
        segments in prop::collection::vec("[a-z]{1,8}", 1..4),
    ) {
        let dir = tempdir().unwrap();
        let relative = segments.join("/");
        prop_assert_eq!(validate_import_path(&relative).unwrap(), relative.clone());

        let writer = SafeWriter::new(dir.path()).unwrap();
        let written = writer.write(Path::new(&relative), "ok").unwrap();
        prop_assert!(written.starts_with(writer.base()));
    }
}

fn walk_files(dir: &Path) -> Vec<String> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                found.push(path.display().to_string());
            }
        }
    }
    found
}
