//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const DEMO: &str = "../../catalogs/demo.toml";

fn exgen() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("exgen").unwrap()
}

fn generate_json(args: &[&str]) -> serde_json::Value {
    let output = exgen()
        .args(["generate", "--catalog", DEMO])
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success(), "generate failed: {output:?}");
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn validate_demo_catalog() {
    exgen()
        .args(["validate", "--catalog", DEMO])
        .assert()
        .success()
        .stdout(predicate::str::contains("16 resources, 1 formulas, 6 models"))
        .stdout(predicate::str::contains("Historical events"))
        .stdout(predicate::str::contains("6 models, 5 complete, 1 incomplete"))
        .stdout(predicate::str::contains("WARNING").not());
}

#[test]
fn validate_strict_fails_on_incomplete_model() {
    exgen()
        .args(["validate", "--catalog", DEMO, "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 incomplete model(s)"));
}

#[test]
fn validate_nonexistent_file() {
    exgen()
        .args(["validate", "--catalog", "nonexistent.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_reports_catalog_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(
        &path,
        r#"
[[models]]
id = 1
type = "open-ended-question"

[models.content]
shuffle_questions_order = false

[[models.content.question_blocks]]
number_of_occurrences = 1
resources = [42]
"#,
    )
    .unwrap();

    exgen()
        .arg("validate")
        .arg("--catalog")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[model 1] WARNING: references unknown resource 42"))
        .stdout(predicate::str::contains("1 models, 0 complete, 1 incomplete"));
}

#[test]
fn list_models() {
    exgen()
        .args(["list-models", "--catalog", DEMO])
        .assert()
        .success()
        .stdout(predicate::str::contains("Speed and distance (multiple-choice, owner 1, formula 100)"))
        .stdout(predicate::str::contains("Draft timeline"));
}

#[test]
fn generate_ordered_items() {
    let instances = generate_json(&["--model", "4", "--seed", "1"]);
    let items = &instances[0]["items"];
    assert_eq!(items["kind"], "ordered");
    let contents: Vec<&str> = items["objects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["content"].as_str().unwrap())
        .collect();
    assert_eq!(
        contents,
        vec![
            "Coronation of Charlemagne",
            "Battle of Hastings",
            "Fall of Constantinople",
            "Storming of the Bastille",
        ]
    );
    assert_eq!(items["values"][0]["content"], "800");
}

#[test]
fn generate_interpolates_formula_values() {
    let instances = generate_json(&["--model", "1", "--seed", "5", "--set", "v=50"]);
    let instance = &instances[0];
    assert_eq!(instance["variables"]["d"], 100.0);
    assert_eq!(instance["wording"], "Answer each question (100 km in total).");
    let questions = instance["items"]["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert!(questions
        .iter()
        .all(|q| !q["content"].as_str().unwrap().contains('$')));
}

#[test]
fn generate_is_reproducible() {
    let args = ["--model", "3", "--seed", "9", "--count", "3"];
    let first = generate_json(&args);
    let second = generate_json(&args);
    assert_eq!(first.as_array().unwrap().len(), 3);
    assert_eq!(first, second);
}

#[test]
fn generate_refuses_incomplete_model() {
    exgen()
        .args(["generate", "--catalog", DEMO, "--model", "6", "--seed", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("model 6 is incomplete"));
}

#[test]
fn generate_unknown_model() {
    exgen()
        .args(["generate", "--catalog", DEMO, "--model", "99", "--seed", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("model 99 not found"));
}

#[test]
fn generate_writes_report() {
    let dir = TempDir::new().unwrap();
    exgen()
        .args(["generate", "--catalog", DEMO, "--model", "2", "--seed", "4"])
        .arg("--output")
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Report saved to"));

    let reports: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(reports.len(), 1);
}

#[test]
fn generate_output_defaults_to_configured_dir() {
    let dir = TempDir::new().unwrap();
    exgen().current_dir(dir.path()).arg("init").assert().success();

    exgen()
        .current_dir(dir.path())
        .args(["generate", "--model", "1", "--seed", "2", "--output"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let reports: Vec<_> = std::fs::read_dir(dir.path().join("exgen-results"))
        .unwrap()
        .collect();
    assert_eq!(reports.len(), 1);
}

#[test]
fn eval_distributes_and_evaluates() {
    exgen()
        .args(["eval", "--expr", "(a + b) * x", "--distribute", "x"])
        .args(["--set", "a=1", "--set", "b=2", "--set", "x=3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a * x + b * x"))
        .stdout(predicate::str::contains("= 9"));
}

#[test]
fn eval_cleans_and_reports_unbound() {
    exgen()
        .args(["eval", "--expr", "x * 1 + 0", "--clean"])
        .assert()
        .success()
        .stdout(predicate::str::diff("x\nunbound: x\n"));
}

#[test]
fn eval_solves_equation() {
    exgen()
        .args(["eval", "--expr", "y = 2 * x + 1", "--set", "y=7", "--unknown", "x"])
        .assert()
        .success()
        .stdout(predicate::str::contains("x = 3"))
        .stdout(predicate::str::contains("y = 7"));
}

#[test]
fn eval_rejects_bad_input() {
    exgen()
        .args(["eval", "--expr", "2 * * 3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid formula"));

    exgen()
        .args(["eval", "--expr", "x", "--set", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected name=value"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    exgen()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created exgen.toml"))
        .stdout(predicate::str::contains("Created catalogs/example.toml"));

    assert!(dir.path().join("exgen.toml").exists());
    assert!(dir.path().join("catalogs/example.toml").exists());

    // The starter catalog is complete and generates.
    exgen()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 models, 1 complete, 0 incomplete"));

    exgen()
        .current_dir(dir.path())
        .args(["generate", "--model", "1", "--seed", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("The tank empties in "));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("exgen.toml"), "# existing").unwrap();

    exgen()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}
