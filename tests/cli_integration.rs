use std::io::Write;
use std::path::Path;
use std::process::Command;

use tempfile::NamedTempFile;

fn write_input() -> NamedTempFile {
    let mut input = NamedTempFile::with_suffix(".jsonl").unwrap();
    for i in 0..8 {
        writeln!(
            input,
            r#"{{"Name":"Name{i}","Number":{i},"Active":{}}}"#,
            i % 2 == 0
        )
        .unwrap();
    }
    input
}

fn read_lines(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn filters_jsonl_to_jsonl() {
    let input = write_input();
    let output = NamedTempFile::with_suffix(".jsonl").unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_rowsift"))
        .arg("--input")
        .arg(input.path())
        .arg("--filter")
        .arg("[Number] > 2")
        .arg("--output")
        .arg(output.path())
        .arg("--verbose")
        .status()
        .expect("failed to execute process");
    assert!(status.success());

    let rows = read_lines(output.path());
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["Name"], "Name3");
    assert_eq!(rows[4]["Number"], 7);
}

#[test]
fn writes_to_stdout_with_limit() {
    let input = write_input();

    let output = Command::new(env!("CARGO_BIN_EXE_rowsift"))
        .arg("--input")
        .arg(input.path())
        .arg("--filter")
        .arg("([Name] == 'Name1') || ([Active] == 'true')")
        .arg("--limit")
        .arg("3")
        .arg("--batch-size")
        .arg("2")
        .output()
        .expect("failed to execute process");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let names: Vec<String> = stdout
        .lines()
        .map(|line| {
            let row: serde_json::Value = serde_json::from_str(line).unwrap();
            row["Name"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(names, vec!["Name0", "Name1", "Name2"]);
}

#[test]
fn named_filter_and_grammar_from_config() {
    let input = write_input();
    let output = NamedTempFile::with_suffix(".jsonl").unwrap();
    let mut filters = NamedTempFile::with_suffix(".yaml").unwrap();
    writeln!(
        filters,
        "grammar: strict\nfilters:\n  small: \"[Number] < 3\"\n  first: \"[Name] == 'Name0'\"\n"
    )
    .unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_rowsift"))
        .arg("--input")
        .arg(input.path())
        .arg("--filters")
        .arg(filters.path())
        .arg("--name")
        .arg("small")
        .arg("--output")
        .arg(output.path())
        .status()
        .expect("failed to execute process");
    assert!(status.success());
    assert_eq!(read_lines(output.path()).len(), 3);

    let status = Command::new(env!("CARGO_BIN_EXE_rowsift"))
        .arg("--input")
        .arg(input.path())
        .arg("--filters")
        .arg(filters.path())
        .arg("--name")
        .arg("small")
        .arg("--grammar")
        .arg("compatible")
        .arg("--output")
        .arg(output.path())
        .status()
        .expect("failed to execute process");
    assert!(status.success());
    assert_eq!(read_lines(output.path()).len(), 4);
}

#[test]
fn round_trips_through_parquet() {
    let input = write_input();
    let parquet = NamedTempFile::with_suffix(".parquet").unwrap();
    let output = NamedTempFile::with_suffix(".jsonl").unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_rowsift"))
        .arg("--input")
        .arg(input.path())
        .arg("--filter")
        .arg("[Number] >= 4")
        .arg("--output")
        .arg(parquet.path())
        .status()
        .expect("failed to execute process");
    assert!(status.success());

    let status = Command::new(env!("CARGO_BIN_EXE_rowsift"))
        .arg("--input")
        .arg(parquet.path())
        .arg("--filter")
        .arg("[Number] <= 5")
        .arg("--output")
        .arg(output.path())
        .status()
        .expect("failed to execute process");
    assert!(status.success());

    let rows = read_lines(output.path());
    let names: Vec<&str> = rows.iter().map(|row| row["Name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Name4", "Name5"]);
    assert_eq!(rows[0]["Active"], true);
}

#[test]
fn rejects_invalid_filters() {
    let input = write_input();

    let output = Command::new(env!("CARGO_BIN_EXE_rowsift"))
        .arg("--input")
        .arg(input.path())
        .arg("--filter")
        .arg("   ")
        .output()
        .expect("failed to execute process");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Filter expression is empty"));
}
