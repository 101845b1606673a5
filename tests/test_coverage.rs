use covmut::coverage::{self, resolve_source_path};
use covmut::error::CoverageError;
use covmut::safety;
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;

const FOO_JAVA: &str = "package com.example;\n\npublic class Foo {\n    int twice(int x) {\n        return x * 2;\n    }\n}\n";

fn write_source(project: &Path, package: &str, name: &str, content: &str) -> std::path::PathBuf {
    let path = resolve_source_path(project, package, name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}

fn write_report(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("jacoco.xml");
    std::fs::write(
        &path,
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<!DOCTYPE report PUBLIC "-//JACOCO//DTD Report 1.1//EN" "report.dtd">
<report name="demo">
<sessioninfo id="s1" start="1" dump="2"/>
{body}
<counter type="LINE" missed="0" covered="2"/>
</report>"#
        ),
    )
    .unwrap();
    path
}

#[test]
fn resolve_source_path_uses_maven_layout() {
    let path = resolve_source_path(Path::new("/proj"), "com/example", "Foo.java");
    assert_eq!(path, Path::new("/proj/src/main/java/com/example/Foo.java"));
}

#[test]
fn resolve_source_path_accepts_dotted_packages() {
    let path = resolve_source_path(Path::new("/proj"), "com.example.util", "Bar.java");
    assert_eq!(path, Path::new("/proj/src/main/java/com/example/util/Bar.java"));
}

#[test]
fn read_report_collects_covered_lines_and_source() {
    let dir = TempDir::new().unwrap();
    let file = write_source(dir.path(), "com/example", "Foo.java", FOO_JAVA);
    let report = write_report(
        dir.path(),
        r#"<package name="com/example">
  <class name="com/example/Foo" sourcefilename="Foo.java">
    <method name="twice" desc="(I)I" line="4"/>
  </class>
  <sourcefile name="Foo.java">
    <line nr="3" mi="3" ci="0" mb="0" cb="0"/>
    <line nr="4" mi="0" ci="2" mb="0" cb="0"/>
    <line nr="5" mi="0" ci="4" mb="0" cb="0"/>
    <counter type="LINE" missed="1" covered="2"/>
  </sourcefile>
</package>"#,
    );

    let map = coverage::read_report(&report, dir.path()).unwrap();
    assert_eq!(map.len(), 1);

    let info = &map[&file];
    assert_eq!(info.file_path, file);
    assert_eq!(info.covered_lines, BTreeSet::from([4, 5]));
    assert_eq!(info.reported_lines, 3);
    assert_eq!(info.source_code, FOO_JAVA);
    assert_eq!(info.file_name(), "Foo.java");
}

#[test]
fn read_report_skips_missing_source_files() {
    let dir = TempDir::new().unwrap();
    let present = write_source(dir.path(), "com/example", "Foo.java", FOO_JAVA);
    let report = write_report(
        dir.path(),
        r#"<package name="com/example">
  <sourcefile name="Gone.java"><line nr="1" ci="1"/></sourcefile>
  <sourcefile name="Foo.java"><line nr="5" ci="1"/></sourcefile>
</package>"#,
    );

    let map = coverage::read_report(&report, dir.path()).unwrap();
    assert_eq!(map.len(), 1);
    assert!(map.contains_key(&present));
}

#[test]
fn read_report_keeps_files_with_no_covered_lines() {
    let dir = TempDir::new().unwrap();
    let file = write_source(dir.path(), "com/example", "Foo.java", FOO_JAVA);
    let report = write_report(
        dir.path(),
        r#"<package name="com/example">
  <sourcefile name="Foo.java"><line nr="5" mi="4" ci="0"/></sourcefile>
</package>"#,
    );

    let map = coverage::read_report(&report, dir.path()).unwrap();
    assert!(map[&file].covered_lines.is_empty());
}

#[test]
fn read_report_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let err = coverage::read_report(&dir.path().join("nope.xml"), dir.path()).unwrap_err();
    assert!(matches!(err, CoverageError::NotFound(_)), "got {err:?}");
}

#[test]
fn read_report_malformed_xml_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jacoco.xml");
    std::fs::write(&path, "<report><package name=\"a\"><sourcefile").unwrap();

    let err = coverage::read_report(&path, dir.path()).unwrap_err();
    assert!(matches!(err, CoverageError::Parse { .. }), "got {err:?}");
}

#[test]
fn read_report_truncated_after_line_is_parse_error() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "a", "A.java", "class A {}\n");
    let path = dir.path().join("jacoco.xml");
    std::fs::write(
        &path,
        r#"<report name="r"><package name="a"><sourcefile name="A.java"><line nr="1" ci="1"/>"#,
    )
    .unwrap();

    let err = coverage::read_report(&path, dir.path()).unwrap_err();
    match err {
        CoverageError::Parse { message, .. } => assert!(message.contains("<sourcefile>"), "{message}"),
        other => panic!("expected Parse error, got {other:?}"),
    }
}

#[test]
fn read_report_mismatched_tags_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jacoco.xml");
    std::fs::write(&path, "<report><package name=\"a\"></sourcefile></report>").unwrap();

    let err = coverage::read_report(&path, dir.path()).unwrap_err();
    assert!(matches!(err, CoverageError::Parse { .. }), "got {err:?}");
}

#[test]
fn read_report_non_numeric_line_is_parse_error() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "a", "A.java", "class A {}\n");
    let report = write_report(
        dir.path(),
        r#"<package name="a"><sourcefile name="A.java"><line nr="x" ci="1"/></sourcefile></package>"#,
    );

    let err = coverage::read_report(&report, dir.path()).unwrap_err();
    assert!(matches!(err, CoverageError::Parse { .. }), "got {err:?}");
}

#[test]
fn read_report_without_report_element_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jacoco.xml");
    std::fs::write(&path, "<coverage/>").unwrap();

    let err = coverage::read_report(&path, dir.path()).unwrap_err();
    assert!(matches!(err, CoverageError::Parse { .. }), "got {err:?}");
}

#[test]
fn read_report_recovers_interrupted_mutation() {
    let dir = TempDir::new().unwrap();
    let file = write_source(dir.path(), "com/example", "Foo.java", "class Foo { MUTATED }\n");
    let backup = safety::backup_path(&file);
    std::fs::write(&backup, FOO_JAVA).unwrap();
    let report = write_report(
        dir.path(),
        r#"<package name="com/example"><sourcefile name="Foo.java"><line nr="5" ci="1"/></sourcefile></package>"#,
    );

    let map = coverage::read_report(&report, dir.path()).unwrap();
    assert_eq!(map[&file].source_code, FOO_JAVA);
    assert_eq!(std::fs::read_to_string(&file).unwrap(), FOO_JAVA);
    assert!(!backup.exists());
}

#[test]
fn read_report_merges_duplicate_entries() {
    let dir = TempDir::new().unwrap();
    let file = write_source(dir.path(), "com/example", "Foo.java", FOO_JAVA);
    let report = write_report(
        dir.path(),
        r#"<package name="com/example"><sourcefile name="Foo.java"><line nr="4" ci="1"/></sourcefile></package>
<package name="com.example"><sourcefile name="Foo.java"><line nr="5" ci="1"/></sourcefile></package>"#,
    );

    let map = coverage::read_report(&report, dir.path()).unwrap();
    assert_eq!(map[&file].covered_lines, BTreeSet::from([4, 5]));
}
