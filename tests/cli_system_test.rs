//! Integration tests for `ran init`, `ran status` and `ran config show`.

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_init_seeds_agents() {
    let env = TestEnv::new();

    env.ran()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"agentsSeeded\":["))
        .stdout(predicate::str::contains("\"agentsReset\":[]"))
        .stdout(predicate::str::contains("\"ARCHITECT\""))
        .stdout(predicate::str::contains("\"financialsCreated\":true"));

    assert!(env.data_path().join("ranalone.db").exists());
}

#[test]
fn test_init_twice_resets_agents() {
    let env = TestEnv::init();

    env.ran()
        .args(["relationship", "adjust", "ARCHITECT", "DISSENTER", "support"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"score\":-70"));

    env.ran()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"agentsReset\":[\"ARCHITECT\""))
        .stdout(predicate::str::contains("\"financialsCreated\":false"));

    env.ran()
        .args(["agent", "show", "ARCHITECT"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"score\":-80"))
        .stdout(predicate::str::contains("\"score\":-70").not());

    env.ran()
        .args(["init", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reset to seed state:"));
}

#[test]
fn test_status_requires_init() {
    let env = TestEnv::new();

    env.ran()
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("ran init"));

    env.ran()
        .args(["status", "-H"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error: "));
}

#[test]
fn test_status_after_init() {
    let env = TestEnv::init();

    env.ran()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"network\":null"))
        .stdout(predicate::str::contains("\"balance\":45"))
        .stdout(predicate::str::contains("\"observerCount\":12847"))
        .stdout(predicate::str::contains("\"pendingEvents\":0"));

    env.ran()
        .args(["status", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Network: not computed yet"))
        .stdout(predicate::str::contains("DISSENTER"))
        .stdout(predicate::str::contains("45 days remaining"));
}

#[test]
fn test_agent_list_and_show() {
    let env = TestEnv::init();

    env.ran()
        .args(["agent", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"agentId\":\"WATCHER\""))
        .stdout(predicate::str::contains("\"status\":\"active\""));

    env.ran()
        .args(["agent", "show", "architect", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(ARCHITECT)"))
        .stdout(predicate::str::contains("Relationships:"))
        .stdout(predicate::str::contains("hostile (-80)"));

    env.ran()
        .args(["agent", "show", "GHOST"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown agent 'GHOST'"));
}

#[test]
fn test_config_show_reports_sources() {
    let env = TestEnv::new();

    env.ran()
        .args(["config", "show", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config file: (none)"))
        .stdout(predicate::str::contains("[env:RANALONE_GENERATOR]"))
        .stdout(predicate::str::contains("[env:RANALONE_DATA_DIR]"));

    let path = env.write_config("gemini-model \"gemini-test\"\nlog-format \"json\"\n");
    env.ran()
        .args(["config", "show"])
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"value\":\"gemini-test\""))
        .stdout(predicate::str::contains("\"source\":\"file:"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let env = TestEnv::new();
    let path = env.write_config("generator \"openai\"\n");

    env.ran()
        .args(["config", "show"])
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown generator"));

    env.ran()
        .args(["status", "--generator", "llama"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown generator 'llama'"));
}
