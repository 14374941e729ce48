use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const RULES: &str = "id,pattern,mode,target_field,required\n\
                     inv,\"#([A-Z0-9]+)\",regex,invoice_id,yes\n\
                     volt,voltage,contains,voltage,\n";

/// A `docsift` command isolated from the user's config directory.
fn docsift(home: &Path) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("docsift").into();
    cmd.current_dir(home);
    cmd.env("NO_COLOR", "1");
    cmd.env("HOME", home).env("XDG_CONFIG_HOME", home.join(".config"));
    cmd
}

fn setup() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let docs = dir.path().join("docs");
    fs::create_dir(&docs).unwrap();
    fs::write(docs.join("a.txt"), "Invoice #A123\nVoltage: 12 V\n").unwrap();
    fs::write(docs.join("b.txt"), "Nothing to see here\n").unwrap();
    fs::write(dir.path().join("rules.csv"), RULES).unwrap();
    fs::write(
        dir.path().join("config.json"),
        r#"{"source": {"file_name_as_id": true}, "pipeline": {"workers": 2}}"#,
    )
    .unwrap();
    dir
}

#[test]
fn test_rules_check_lists_rules() {
    let dir = setup();

    docsift(dir.path())
        .args(["rules", "check"])
        .arg(dir.path().join("rules.csv"))
        .assert()
        .success()
        .stdout(predicate::str::contains("2 rules OK"))
        .stdout(predicate::str::contains("invoice_id"));
}

#[test]
fn test_rules_check_rejects_bad_pattern() {
    let dir = setup();
    let rules = dir.path().join("bad.csv");
    fs::write(
        &rules,
        "id,pattern,mode,target_field,required\nbroken,\"(unclosed\",regex,field,\n",
    )
    .unwrap();

    docsift(dir.path())
        .args(["rules", "check"])
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("pattern for rule 'broken' does not compile"));
}

#[test]
fn test_extract_writes_csv_table() {
    let dir = setup();
    let output = dir.path().join("out.csv");

    docsift(dir.path())
        .arg("-c")
        .arg(dir.path().join("config.json"))
        .arg("extract")
        .arg(format!("{}/docs/*.txt", dir.path().display()))
        .arg("--rules")
        .arg(dir.path().join("rules.csv"))
        .arg("-o")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 2 files"))
        .stdout(predicate::str::contains("b.txt: missing inv"));

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "source_id,invoice_id,voltage,missing_required,processing_error\n\
         a.txt,A123,Voltage,,\n\
         b.txt,,,inv,\n"
    );
}

#[test]
fn test_extract_json_sorted() {
    let dir = setup();
    let output = dir.path().join("out.json");

    docsift(dir.path())
        .arg("-c")
        .arg(dir.path().join("config.json"))
        .arg("extract")
        .arg(format!("{}/docs/*.txt", dir.path().display()))
        .arg("--rules")
        .arg(dir.path().join("rules.csv"))
        .args(["--format", "json", "--sort-by", "invoice_id", "-j", "1", "-o"])
        .arg(&output)
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["source_id"], "a.txt");
    assert_eq!(rows[0]["fields"]["invoice_id"], "A123");
    assert_eq!(rows[1]["fields"]["invoice_id"], serde_json::Value::Null);
    assert_eq!(json["cancelled"], false);
}

#[test]
fn test_extract_unknown_sort_key_fails() {
    let dir = setup();

    docsift(dir.path())
        .arg("extract")
        .arg(format!("{}/docs/*.txt", dir.path().display()))
        .arg("--rules")
        .arg(dir.path().join("rules.csv"))
        .args(["--sort-by", "nope", "-o"])
        .arg(dir.path().join("out.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_extract_no_matching_files() {
    let dir = setup();

    docsift(dir.path())
        .arg("extract")
        .arg(format!("{}/docs/*.pdf", dir.path().display()))
        .arg("--rules")
        .arg(dir.path().join("rules.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files found"));
}

#[test]
fn test_compare_reports_changes() {
    let dir = setup();
    let docs = dir.path().join("docs");
    fs::write(docs.join("a_v2.txt"), "Invoice #A124\nVoltage: 12 V\n").unwrap();
    fs::write(
        dir.path().join("pairs.csv"),
        format!(
            "old,latest\n{0}/a.txt,{0}/a_v2.txt\n{0}/a.txt,{0}/a.txt\n",
            docs.display()
        ),
    )
    .unwrap();
    fs::write(
        dir.path().join("mapping.csv"),
        "field,feature\ninvoice_id,Billing\n",
    )
    .unwrap();
    let output = dir.path().join("report.csv");

    docsift(dir.path())
        .arg("-c")
        .arg(dir.path().join("config.json"))
        .arg("compare")
        .arg(dir.path().join("pairs.csv"))
        .arg("--rules")
        .arg(dir.path().join("rules.csv"))
        .arg("--mapping")
        .arg(dir.path().join("mapping.csv"))
        .arg("-o")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Compared 2 pairs"));

    let report = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(
        lines[0],
        "old,latest,old_chars,latest_chars,data_changed,changed_fields,mapped_features,error,\
         invoice_id_old,invoice_id_latest,invoice_id_same,\
         voltage_old,voltage_latest,voltage_same"
    );
    assert_eq!(
        lines[1],
        "a.txt,a_v2.txt,28,28,yes,invoice_id,billing,,A123,A124,false,Voltage,Voltage,true"
    );
    assert_eq!(
        lines[2],
        "a.txt,a.txt,28,28,no,,,,A123,A123,true,Voltage,Voltage,true"
    );
}

#[test]
fn test_compare_same_file_name_in_two_directories() {
    let dir = setup();
    let old = dir.path().join("old");
    let new = dir.path().join("new");
    fs::create_dir(&old).unwrap();
    fs::create_dir(&new).unwrap();
    fs::write(old.join("p.txt"), "Invoice #OLD1\n").unwrap();
    fs::write(new.join("p.txt"), "Invoice #NEW2\n").unwrap();
    fs::write(
        dir.path().join("pairs.csv"),
        format!(
            "old,latest\n{},{}\n",
            old.join("p.txt").display(),
            new.join("p.txt").display()
        ),
    )
    .unwrap();
    let output = dir.path().join("report.csv");

    docsift(dir.path())
        .arg("-c")
        .arg(dir.path().join("config.json"))
        .arg("compare")
        .arg(dir.path().join("pairs.csv"))
        .arg("--rules")
        .arg(dir.path().join("rules.csv"))
        .arg("-o")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 changed"));

    let report = fs::read_to_string(&output).unwrap();
    let row = report.lines().nth(1).unwrap();
    assert!(row.starts_with(&format!(
        "{},{},14,14,yes,invoice_id,",
        old.join("p.txt").display(),
        new.join("p.txt").display()
    )));
    assert!(row.contains(",OLD1,NEW2,false,"));
}

#[test]
fn test_compare_runs_one_report_per_group() {
    let dir = setup();
    let docs = dir.path().join("docs");
    fs::write(docs.join("a_v2.txt"), "Invoice #A124\nVoltage: 12 V\n").unwrap();
    fs::write(docs.join("n1.txt"), "Lot 7\n").unwrap();
    fs::write(docs.join("n2.txt"), "Lot 8\n").unwrap();
    fs::write(
        dir.path().join("grouped_rules.csv"),
        "id,pattern,mode,target_field,required,group\n\
         inv_ti,\"#([A-Z0-9]+)\",regex,invoice_id,yes,TI\n\
         lot_nxp,\"Lot ([0-9]+)\",regex,invoice_id,yes,NXP\n\
         volt,voltage,contains,voltage,,\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("pairs.csv"),
        format!(
            "old,latest,group\n{0}/a.txt,{0}/a_v2.txt,TI\n{0}/n1.txt,{0}/n2.txt,NXP\n",
            docs.display()
        ),
    )
    .unwrap();
    fs::write(
        dir.path().join("mapping.csv"),
        "field,feature,group\ninvoice_id,Billing,\ninvoice_id,Traceability,NXP\n",
    )
    .unwrap();

    docsift(dir.path())
        .arg("-c")
        .arg(dir.path().join("config.json"))
        .arg("compare")
        .arg(dir.path().join("pairs.csv"))
        .arg("--rules")
        .arg(dir.path().join("grouped_rules.csv"))
        .arg("--mapping")
        .arg(dir.path().join("mapping.csv"))
        .arg("-o")
        .arg(dir.path().join("report.csv"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Compared 2 pairs"));

    assert!(!dir.path().join("report.csv").exists());
    let ti = fs::read_to_string(dir.path().join("report_TI.csv")).unwrap();
    assert_eq!(
        ti.lines().nth(1).unwrap(),
        "a.txt,a_v2.txt,28,28,yes,invoice_id,billing,,A123,A124,false,Voltage,Voltage,true"
    );
    let nxp = fs::read_to_string(dir.path().join("report_NXP.csv")).unwrap();
    assert_eq!(
        nxp.lines().nth(1).unwrap(),
        "n1.txt,n2.txt,6,6,yes,invoice_id,traceability,,7,8,false,,,true"
    );
}

#[test]
fn test_rules_check_validates_each_group() {
    let dir = setup();
    let rules = dir.path().join("grouped_rules.csv");
    fs::write(
        &rules,
        "id,pattern,mode,target_field,required,group\n\
         a,alpha,contains,code,,TI\n\
         b,beta,contains,code,,NXP\n",
    )
    .unwrap();

    docsift(dir.path())
        .args(["rules", "check"])
        .arg(&rules)
        .assert()
        .success()
        .stdout(predicate::str::contains("group TI: 1 rules OK"))
        .stdout(predicate::str::contains("group NXP: 1 rules OK"));
}

#[test]
fn test_extract_json_honors_include_diagnostics() {
    let dir = setup();
    let config = dir.path().join("quiet.json");
    fs::write(
        &config,
        r#"{"source": {"file_name_as_id": true}, "output": {"include_diagnostics": false}}"#,
    )
    .unwrap();
    let output = dir.path().join("out.json");

    docsift(dir.path())
        .arg("-c")
        .arg(&config)
        .arg("extract")
        .arg(format!("{}/docs/*.txt", dir.path().display()))
        .arg("--rules")
        .arg(dir.path().join("rules.csv"))
        .args(["--format", "json", "-o"])
        .arg(&output)
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows[1]["source_id"], "b.txt");
    assert!(rows[1].get("missing_required").is_none());
}

#[test]
fn test_config_init_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.json");

    docsift(dir.path())
        .args(["config", "init", "-o"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    docsift(dir.path())
        .args(["config", "get", "pipeline.workers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4"));
}

#[test]
fn test_config_commands_use_config_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.json");

    docsift(dir.path())
        .arg("-c")
        .arg(&path)
        .args(["config", "set", "pipeline.workers", "9"])
        .assert()
        .success();
    assert!(fs::read_to_string(&path).unwrap().contains("\"workers\": 9"));
    assert!(!dir.path().join(".config").join("docsift").exists());

    docsift(dir.path())
        .arg("-c")
        .arg(&path)
        .args(["config", "get", "pipeline.workers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("9"));

    docsift(dir.path())
        .arg("-c")
        .arg(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.json"));
}
