//! Driver tests over fixture files on disk.

use cdsc_cli::args::{CliArgs, OutputFormat};
use cdsc_cli::driver::{self, Report};
use cdsc_cli::tracing_config::LogFormat;
use clap::Parser;
use std::io::Write;
use tempfile::NamedTempFile;

const MODEL: &str = r#"{
  "definitions": {
    "Authors": {
      "kind": "entity",
      "elements": {
        "ID": { "type": "Integer", "key": true },
        "name": { "type": "String" }
      }
    },
    "Books": {
      "kind": "entity",
      "$location": { "file": "db/schema.cds", "line": 3, "col": 8 },
      "elements": {
        "ID": { "type": "Integer", "key": true },
        "title": { "type": "Title" },
        "author": { "type": "Association", "target": "Authors", "keys": [{ "ref": ["ID"] }] }
      }
    },
    "Title": { "kind": "type", "type": "String" },
    "BookTitles": {
      "kind": "entity",
      "query": {
        "SELECT": {
          "from": { "ref": ["Books"] },
          "columns": [{ "ref": ["title"] }, { "ref": ["author", "name"], "as": "author" }]
        }
      },
      "elements": {
        "title": { "type": "Title" },
        "author": { "type": "String" }
      }
    }
  }
}"#;

fn fixture(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn run(file: &NamedTempFile, flags: &[&str]) -> Report {
    let mut argv = vec!["cdsc-inspect", file.path().to_str().unwrap()];
    argv.extend_from_slice(flags);
    let args = CliArgs::try_parse_from(argv).unwrap();
    driver::run(&args).unwrap()
}

fn render(report: &Report, format: OutputFormat) -> String {
    let mut out = Vec::new();
    driver::write_report(report, format, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_single_path() {
    let file = fixture(MODEL);
    let report = run(&file, &["-p", "definitions/BookTitles/query/SELECT/columns/1"]);

    assert!(!report.has_errors());
    assert_eq!(report.references.len(), 1);
    let resolution = report.references[0].resolution.as_ref().unwrap();
    assert_eq!(resolution["scope"], "source");
    assert_eq!(resolution["art"], "definitions/Authors/elements/name");

    let text = render(&report, OutputFormat::Text);
    assert!(
        text.contains("definitions/BookTitles/query/SELECT/columns/1: [columns] source -> definitions/Authors/elements/name"),
        "{text}"
    );
}

#[test]
fn test_all_references_of_one_definition() {
    let file = fixture(MODEL);
    let report = run(&file, &["--all", "--definition", "Books"]);
    let paths: Vec<&str> = report.references.iter().map(|r| r.path.as_str()).collect();
    assert!(paths.contains(&"definitions/Books/elements/author/keys/0"), "{paths:?}");
    assert!(paths.iter().all(|p| p.starts_with("definitions/Books/")));
    assert!(!report.has_errors());
}

#[test]
fn test_origin_and_effective_type() {
    let file = fixture(MODEL);
    let report = run(
        &file,
        &["-p", "definitions/BookTitles/elements/title", "--origin", "--effective-type"],
    );
    assert_eq!(report.members.len(), 1);
    let member = &report.members[0];
    assert_eq!(member.origin.as_deref(), Some("definitions/Title"));
    assert_eq!(member.effective_type.as_deref(), Some("definitions/Title"));
}

#[test]
fn test_locations() {
    let file = fixture(MODEL);
    let report = run(&file, &["-p", "definitions/Books/elements/author/keys/0", "--locations"]);
    let entry = &report.references[0];
    assert_eq!(
        entry.semantic_location.as_deref(),
        Some(r#"entity:"Books"/element:"author"/keys"#)
    );
    assert_eq!(entry.location.as_ref().map(|l| l.file.as_str()), Some("db/schema.cds"));
}

#[test]
fn test_model_errors_are_reported_not_fatal() {
    let broken = MODEL.replace(r#""ref": ["author", "name"]"#, r#""ref": ["author", "nickname"]"#);
    let file = fixture(&broken);
    let report = run(&file, &["--all", "--format", "json"]);
    assert_eq!(report.errors, 1);

    let failed: Vec<_> = report.references.iter().filter(|r| r.error.is_some()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].path, "definitions/BookTitles/query/SELECT/columns/1");

    let json: serde_json::Value = serde_json::from_str(&render(&report, OutputFormat::Json)).unwrap();
    assert_eq!(json["errors"], 1);
}

#[test]
fn test_snapshot() {
    let file = fixture(MODEL);
    let report = run(&file, &["--all", "-d", "BookTitles", "--snapshot"]);
    assert_eq!(report.snapshots.len(), 1);
    assert_eq!(report.snapshots[0]["definition"], "BookTitles");
}

#[test]
fn test_load_failures() {
    let file = fixture("{ \"definitions\": ");
    let args = CliArgs::try_parse_from(["cdsc-inspect", file.path().to_str().unwrap()]).unwrap();
    let err = driver::run(&args).unwrap_err();
    assert!(err.to_string().contains("failed to load schema document"));

    let file = fixture(MODEL);
    let args = CliArgs::try_parse_from([
        "cdsc-inspect",
        file.path().to_str().unwrap(),
        "--all",
        "-d",
        "Publishers",
    ])
    .unwrap();
    let err = driver::run(&args).unwrap_err();
    assert!(err.to_string().contains("Publishers"));
}

#[test]
fn test_log_format_parsing() {
    assert_eq!(LogFormat::parse("tree"), LogFormat::Tree);
    assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
    assert_eq!(LogFormat::parse(""), LogFormat::Text);
}
