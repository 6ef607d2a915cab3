//! Input aggregation and export splitting over real directory trees.

use std::fs;

use kiln_core::aggregate;
use kiln_core::preprocess::{CYCLIC_IMPORT_MARKER, MISSING_IMPORT_MARKER, TemplateStripper, process_exports};
use tempfile::TempDir;

#[test]
fn test_diamond_inlined_once_per_reference_site() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(dir.join("main.md"), "IMPORT: left.md\nIMPORT: right.md\n").unwrap();
    fs::write(dir.join("left.md"), "left\nIMPORT: shared.md\n").unwrap();
    fs::write(dir.join("right.md"), "right\nIMPORT: shared.md\n").unwrap();
    fs::write(dir.join("shared.md"), "SHARED BODY\n").unwrap();

    let context = aggregate(&[dir.join("main.md")]).unwrap();
    let text = context.text();

    assert_eq!(text.matches("SHARED BODY").count(), 2);
    assert!(!text.contains("IMPORT:"));
    assert!(text.find("left").unwrap() < text.find("right").unwrap());
    assert!(context.missing_imports().is_empty());
}

#[test]
fn test_cycle_terminates_with_marker() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(dir.join("a.md"), "alpha\nIMPORT: b.md\n").unwrap();
    fs::write(dir.join("b.md"), "beta\nIMPORT: a.md\n").unwrap();

    let context = aggregate(&[dir.join("a.md")]).unwrap();
    let text = context.text();

    assert_eq!(text.matches("alpha").count(), 1);
    assert_eq!(text.matches("beta").count(), 1);
    assert_eq!(text.matches(&format!("{CYCLIC_IMPORT_MARKER}a.md")).count(), 1);
}

#[test]
fn test_missing_import_is_marked_and_reported() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(dir.join("main.md"), "INCLUDE: \"gone.h\"\nrest\n").unwrap();

    let context = aggregate(&[dir.join("main.md")]).unwrap();

    assert!(context.text().contains(&format!("{MISSING_IMPORT_MARKER}gone.h")));
    assert_eq!(context.missing_imports(), ["gone.h".to_string()]);
}

#[test]
fn test_multiple_inputs_keep_order() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(dir.join("one.md"), "first document\n").unwrap();
    fs::write(dir.join("two.md"), "second document\n").unwrap();

    let context = aggregate(&[dir.join("one.md"), dir.join("two.md")]).unwrap();
    let text = context.text();

    assert!(text.find("first document").unwrap() < text.find("second document").unwrap());
    assert_eq!(context.sources().len(), 2);
}

#[test]
fn test_n_blocks_give_n_files_without_templates() {
    let temp = TempDir::new().unwrap();
    let text = "notes before\n\
                EXPORT: \"a.txt\"\nalpha $${ hidden }$$ end\nEXPORT: END\n\
                EXPORT: \"sub/b.txt\"\nbeta\n$${ spans\nthree\nlines }$$ tail\nEXPORT: END\n\
                EXPORT: \"c.txt\"\ngamma\n";

    let report = process_exports(text, temp.path());

    assert_eq!(report.written.len(), 3);
    assert!(report.failed.is_empty());
    assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "alpha  end\n");
    assert_eq!(
        fs::read_to_string(temp.path().join("sub/b.txt")).unwrap(),
        "beta\n tail\n"
    );
    assert_eq!(fs::read_to_string(temp.path().join("c.txt")).unwrap(), "gamma\n");
    assert_eq!(report.residual, "notes before\n");
}

#[test]
fn test_template_across_three_lines_keeps_boundaries() {
    let stripped = TemplateStripper::strip_text("keep $${ one\ntwo\nthree }$$ also\n");
    assert_eq!(stripped, "keep \n also\n");
}
