use clap::Parser;
use ordo_cli::{parse_params, run, Args};
use ordo_config::{ConfigLoader, OrdoConfig, CONFIG_FILE};
use serde_json::json;
use std::fs;
use tempfile::tempdir;

const RULES: &str = r#"
rule "restock"
priority 1
when
    stock < 20
then
    set_variable("order", 50);
    exclude("clearance");
end

rule "clearance"
priority 2
then
    set_variable("discount", 30)
end
"#;

#[test]
fn test_run_with_rules_flag() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("stock.rule"), RULES).unwrap();

    let args = Args::parse_from([
        "ordo",
        "--rules",
        dir.path().to_str().unwrap(),
        "--params",
        r#"{"stock": 5}"#,
    ]);
    let output = run(&args, &OrdoConfig::default()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();

    assert_eq!(value, json!({"order": 50}));
}

#[test]
fn test_run_from_config_dir() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("rules")).unwrap();
    fs::write(dir.path().join("rules/stock.rule"), RULES).unwrap();
    fs::write(dir.path().join("rules/notes.txt"), "ignored").unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE),
        "[engine]\nrules_dir = \"rules\"\nrule_extension = \"rule\"\n",
    )
    .unwrap();

    let config = ConfigLoader::new(dir.path()).load_validated().unwrap();
    let args = Args::parse_from(["ordo", "--params", r#"{"stock": 50}"#, "--report"]);
    let output = run(&args, &config).unwrap();
    let report: serde_json::Value = serde_json::from_str(&output).unwrap();

    assert_eq!(report["variables"], json!({"discount": 30}));
    assert_eq!(report["outcomes"][0]["rule"], json!("restock"));
    assert_eq!(report["outcomes"][0]["status"], json!("not_matched"));
    assert_eq!(report["outcomes"][1]["status"], json!("fired"));
}

#[test]
fn test_params_must_be_object() {
    assert!(parse_params("[1, 2]").is_err());
    assert!(parse_params("not json").is_err());
    assert_eq!(parse_params(r#"{"a": 1}"#).unwrap().get("a"), Some(&json!(1)));
}

#[test]
fn test_params_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("params.json");
    fs::write(&path, r#"{"event": "checkout"}"#).unwrap();

    let params = parse_params(&format!("@{}", path.display())).unwrap();
    assert_eq!(params.get("event"), Some(&json!("checkout")));
}

#[test]
fn test_missing_rules_dir_fails() {
    let dir = tempdir().unwrap();
    let args = Args::parse_from([
        "ordo",
        "--rules",
        dir.path().join("missing").to_str().unwrap(),
    ]);
    assert!(run(&args, &OrdoConfig::default()).is_err());
}
