use assert_cmd::prelude::*;
use predicates::str::contains;
use std::process::Command;

#[test]
fn runs_without_arguments() {
    let mut cmd = Command::cargo_bin("rv64sim").unwrap();
    cmd.assert().success();
}

#[test]
fn runs_add_program() {
    let mut cmd = Command::cargo_bin("rv64sim").unwrap();
    cmd.arg("run").arg("tests/files/add.s").arg("--minimal");

    cmd.assert()
        .success()
        .stdout(contains("Executed addi x10, x0, 5 ; PC = 0x00000000"))
        .stdout(contains("Executed add x12, x10, x11 ; PC = 0x00000008"))
        .stdout(contains("x12 = 0x0000000000000008"))
        .stdout(contains("x0 = 0x0000000000000000"));
}

#[test]
fn runs_loop_to_completion() {
    let mut cmd = Command::cargo_bin("rv64sim").unwrap();
    cmd.arg("run").arg("tests/files/loop.s").arg("--minimal");

    cmd.assert()
        .success()
        .stdout(contains("Executed bne a0, x0, loop ; PC = 0x00000008"))
        .stdout(contains("x10 = 0x0000000000000000"))
        .stdout(contains("x11 = 0x0000000000000001"));
}

#[test]
fn loads_data_section() {
    let mut cmd = Command::cargo_bin("rv64sim").unwrap();
    cmd.arg("run").arg("tests/files/data.s").arg("--minimal");

    cmd.assert()
        .success()
        .stdout(contains("x5 = 0x0000000000010000"))
        .stdout(contains("x6 = 0x0000000012345678"))
        .stdout(contains("x7 = 0x0000000000000001"));
}

#[test]
fn reports_execution_fault() {
    let mut cmd = Command::cargo_bin("rv64sim").unwrap();
    cmd.arg("run").arg("tests/files/fault.s").arg("--minimal");

    cmd.assert()
        .failure()
        .stdout(contains("Executed lui t0, 0x90 ; PC = 0x00000000"))
        .stdout(contains("x7 = 0x0000000000000000"))
        .stderr(contains("run::fault"));
}

#[test]
fn checks_valid_file() {
    let mut cmd = Command::cargo_bin("rv64sim").unwrap();
    cmd.arg("check").arg("tests/files/loop.s");

    cmd.assert().success().stderr(contains("Success"));
}

#[test]
fn rejects_duplicate_label() {
    let mut cmd = Command::cargo_bin("rv64sim").unwrap();
    cmd.arg("check").arg("tests/files/duplicate.s").arg("--minimal");

    cmd.assert()
        .failure()
        .stderr(contains("load::duplicate_label"));
}

#[test]
fn rejects_missing_file() {
    let mut cmd = Command::cargo_bin("rv64sim").unwrap();
    cmd.arg("run").arg("tests/files/missing.s").arg("--minimal");

    cmd.assert().failure().stderr(contains("load::io"));
}

#[test]
fn permissive_flag_skips_unknown_opcodes() {
    let mut cmd = Command::cargo_bin("rv64sim").unwrap();
    cmd.arg("check").arg("tests/files/unknown.s").arg("--minimal");
    cmd.assert().failure().stderr(contains("decode::instruction"));

    let mut cmd = Command::cargo_bin("rv64sim").unwrap();
    cmd.arg("run")
        .arg("tests/files/unknown.s")
        .arg("--minimal")
        .arg("--permissive");
    cmd.assert()
        .success()
        .stdout(contains("Executed ecall ; PC = 0x00000004"))
        .stdout(contains("x1 = 0x0000000000000002"));
}

#[test]
fn reports_fault_status() {
    let mut cmd = Command::cargo_bin("rv64sim").unwrap();
    cmd.arg("run").arg("tests/files/fault.s");

    cmd.assert().failure().stderr(contains("Faulted"));
}

#[test]
fn runs_assembler_style_source() {
    let mut cmd = Command::cargo_bin("rv64sim").unwrap();
    cmd.arg("run").arg("tests/files/assembler.s").arg("--minimal");

    cmd.assert()
        .success()
        .stdout(contains("Executed bne t0, x0, 1 ; PC = 0x00000008"))
        .stdout(contains("x5 = 0x0000000000000000"));
}
