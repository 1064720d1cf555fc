// ABOUTME: Subprocess tests of the compiled binary's file/exit-code contract

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn script_file(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", source).unwrap();
    file
}

#[test]
fn runs_a_script_and_exits_zero() {
    let file = script_file("let a = 1; let b = 2; print a + b;");
    Command::cargo_bin("minilang")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout("3.000000\n");
}

#[test]
fn missing_script_file_exits_nonzero() {
    Command::cargo_bin("minilang")
        .unwrap()
        .arg("/nonexistent/path/does-not-exist.lang")
        .assert()
        .failure();
}

#[test]
fn lex_error_reports_phase_prefix_and_exits_nonzero() {
    let file = script_file("let x = @;");
    Command::cargo_bin("minilang")
        .unwrap()
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Lexing Error"));
}

#[test]
fn parse_error_reports_phase_prefix_and_exits_nonzero() {
    let file = script_file("let = 1;");
    Command::cargo_bin("minilang")
        .unwrap()
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Parsing Error"));
}

#[test]
fn runtime_error_reports_phase_prefix_and_exits_nonzero() {
    let file = script_file("print undefined_name;");
    Command::cargo_bin("minilang")
        .unwrap()
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Runtime Error"));
}

#[test]
fn recursive_factorial_end_to_end() {
    let file = script_file(
        "function fact(n) { if (n <= 1) { return 1; } return n * fact(n - 1); } print fact(5);",
    );
    Command::cargo_bin("minilang")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout("120.000000\n");
}
