//! CLI surface tests for the storeforge binary.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_command_groups() {
    let mut cmd = Command::cargo_bin("storeforge").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("store"))
        .stdout(predicate::str::contains("products"))
        .stdout(predicate::str::contains("extension"))
        .stdout(predicate::str::contains("payments"))
        .stdout(predicate::str::contains("search"));
}

#[test]
fn test_store_create_requires_identity() {
    let mut cmd = Command::cargo_bin("storeforge").unwrap();
    cmd.args(["store", "create"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--hub-org"));
}

#[test]
fn test_extension_map_requires_store_identity() {
    // validation fires before the platform CLI is ever invoked, so this
    // passes on machines with no sfdx installed
    let mut cmd = Command::cargo_bin("storeforge").unwrap();
    cmd.args([
        "extension",
        "map",
        "-u",
        "admin@scratch.example",
        "--name",
        "TaxProvider",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains(
        "Either a store name or a store id must be supplied",
    ));
}

#[test]
fn test_search_index_requires_store_identity() {
    let mut cmd = Command::cargo_bin("storeforge").unwrap();
    cmd.args(["search", "index", "-u", "admin@scratch.example"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Either a store name or a store id must be supplied",
        ));
}

#[test]
fn test_unknown_subcommand_rejected() {
    let mut cmd = Command::cargo_bin("storeforge").unwrap();
    cmd.arg("decommission").assert().failure();
}
