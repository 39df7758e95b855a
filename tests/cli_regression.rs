// Drives the `bramble-selftest` binary end to end.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

fn selftest() -> Command {
    let mut cmd = Command::cargo_bin("bramble-selftest").unwrap();
    cmd.env_remove("BRAMBLE_LOG");
    cmd
}

#[test]
fn run_passes_and_prints_totals() {
    selftest()
        .assert()
        .success()
        .stdout(contains("[+] Math.adds"))
        .stdout(contains("[+] Math.doubles 3"))
        .stdout(contains("[!] Math.divides by zero (skipped)"))
        .stdout(contains("Tests Passed: 9, Failed: 0, Skipped: 1, NotRun: 0"));
}

#[test]
fn parameter_flag_reaches_the_tests() {
    selftest()
        .args(["run", "--param", "fail=true"])
        .assert()
        .failure()
        .stdout(contains("[-] Switches.honours the fail switch"))
        .stdout(contains("to NOT be true"));
}

#[test]
fn full_name_filter_marks_other_tests_not_run() {
    selftest()
        .args(["--full-name", "Strings.*"])
        .assert()
        .success()
        .stdout(contains("[+] Strings.matches wildcards"))
        .stdout(contains("[+] Math.adds").not())
        .stdout(contains("Passed: 2,"));
}

#[test]
fn discover_prints_the_tree_without_running() {
    selftest()
        .arg("discover")
        .assert()
        .success()
        .stdout(contains("+ Math [fast]"))
        .stdout(contains("  - adds"))
        .stdout(contains("  - divides by zero (skip)"))
        .stdout(contains("[+]").not());
}

#[test]
fn operators_lists_the_registry() {
    selftest()
        .arg("operators")
        .assert()
        .success()
        .stdout(contains("BeLike"))
        .stdout(contains("BeNullOrEmpty"));
}

#[test]
fn missing_config_file_is_a_diagnostic() {
    selftest()
        .args(["--config", "does/not/exist.yaml"])
        .assert()
        .failure()
        .stderr(contains("bramble::config").or(contains("cannot read")));
}
