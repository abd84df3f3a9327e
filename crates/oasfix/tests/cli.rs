use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const THINGS: &str = include_str!("fixtures/things.yaml");

fn oasfix(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_oasfix"))
        .args(args)
        .current_dir(dir)
        .env_remove("OASFIX_LOG")
        .output()
        .expect("failed to execute oasfix")
}

fn code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

#[test]
fn fix_writes_repaired_document() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    fs::write(tmp.path().join("things.yaml"), THINGS)?;

    let output = oasfix(
        tmp.path(),
        &["fix", "--no-config", "-o", "fixed.yaml", "things.yaml"],
    );
    assert_eq!(code(&output), 0, "{}", String::from_utf8_lossy(&output.stderr));

    let fixed = fs::read_to_string(tmp.path().join("fixed.yaml"))?;
    assert!(fixed.contains("operationId: listThings_fixed"));
    assert!(fixed.contains("'200':"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("0 residual diagnostics"), "{stderr}");
    Ok(())
}

#[test]
fn fix_prints_to_stdout_without_output() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    fs::write(tmp.path().join("things.yaml"), THINGS)?;

    let output = oasfix(tmp.path(), &["fix", "--no-config", "things.yaml"]);
    assert_eq!(code(&output), 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("openapi: 3.0.3\n"));
    assert!(stdout.contains("listThings_fixed"));
    assert_eq!(fs::read_to_string(tmp.path().join("things.yaml"))?, THINGS);
    Ok(())
}

#[test]
fn check_reports_pending_changes_then_passes() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    fs::write(tmp.path().join("things.yaml"), THINGS)?;

    let before = oasfix(tmp.path(), &["check", "--no-config", "things.yaml"]);
    assert_eq!(code(&before), 1);
    assert!(String::from_utf8_lossy(&before.stderr).contains("would be rewritten"));
    assert_eq!(fs::read_to_string(tmp.path().join("things.yaml"))?, THINGS);

    let fixed = oasfix(
        tmp.path(),
        &["fix", "--no-config", "--in-place", "things.yaml"],
    );
    assert_eq!(code(&fixed), 0);

    let after = oasfix(tmp.path(), &["check", "--no-config", "things.yaml"]);
    assert_eq!(code(&after), 0, "{}", String::from_utf8_lossy(&after.stderr));
    Ok(())
}

#[test]
fn config_output_format_is_honored() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    fs::write(tmp.path().join("oasfix.toml"), "root = true\noutput-format = \"json\"\n")?;
    fs::write(tmp.path().join("things.yaml"), THINGS)?;

    let output = oasfix(tmp.path(), &["fix", "things.yaml"]);
    assert_eq!(code(&output), 0);
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(
        doc["paths"]["/things/all"]["get"]["operationId"],
        "listThings_fixed"
    );
    Ok(())
}

#[test]
fn unreadable_document_is_fatal() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    fs::write(tmp.path().join("broken.json"), "{\"openapi\": \"3.0.3\",")?;

    let output = oasfix(tmp.path(), &["fix", "--no-config", "broken.json"]);
    assert_eq!(code(&output), 2);
    assert!(output.stdout.is_empty());

    let missing = oasfix(tmp.path(), &["check", "--no-config", "missing.json"]);
    assert_eq!(code(&missing), 2);
    assert!(String::from_utf8_lossy(&missing.stderr).contains("failed to read missing.json"));
    Ok(())
}

#[test]
fn in_place_conflicts_with_output() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    fs::write(tmp.path().join("things.yaml"), THINGS)?;
    let output = oasfix(
        tmp.path(),
        &["fix", "--in-place", "-o", "x.yaml", "things.yaml"],
    );
    assert_eq!(code(&output), 2);
    Ok(())
}

#[test]
fn config_schema_is_printed() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let output = oasfix(tmp.path(), &["config-schema"]);
    assert_eq!(code(&output), 0);
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(schema["title"], "oasfix.toml");
    Ok(())
}
