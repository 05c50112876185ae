//! CLI end-to-end tests (§8): exercises the `funcy` binary as a subprocess
//! rather than calling into the library directly, so these cover argument
//! parsing, exit codes, and file I/O the same way a user would hit them.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn funcy() -> Command {
    Command::cargo_bin("funcy").unwrap()
}

#[test]
fn no_arguments_prints_usage_to_stderr_and_exits_one() {
    funcy()
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Usage").or(predicate::str::contains("funcy")));
}

#[test]
fn build_on_missing_input_exits_one_with_a_stderr_message() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.fvm");

    funcy()
        .arg("build")
        .arg(dir.path().join("does-not-exist.fy"))
        .arg(&output)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"));

    assert!(!output.exists());
}

#[test]
fn run_on_missing_input_exits_one_with_a_stderr_message() {
    funcy()
        .arg("run")
        .arg("/nonexistent/path.fy")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn build_writes_bytecode_that_carries_the_fvm_magic_and_run_reproduces_it() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("hello.fy");
    let bytecode = dir.path().join("hello.fvm");

    std::fs::write(&source, "func main() { printIntLn(42); return; }").unwrap();

    funcy()
        .arg("build")
        .arg(&source)
        .arg(&bytecode)
        .assert()
        .success()
        .code(0);

    let bytes = std::fs::read(&bytecode).unwrap();
    assert!(bytes.starts_with(&funcy_bc::MAGIC[..]));

    funcy()
        .arg("run")
        .arg(&bytecode)
        .assert()
        .success()
        .code(0)
        .stdout(predicate::str::contains("42"));
}

#[test]
fn running_the_original_source_reproduces_the_same_result_as_compiled_bytecode() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("hello.fy");
    std::fs::write(&source, "func main() { printIntLn(7); return; }").unwrap();

    funcy()
        .arg("run")
        .arg(&source)
        .assert()
        .success()
        .code(0)
        .stdout(predicate::str::contains("7"));
}
