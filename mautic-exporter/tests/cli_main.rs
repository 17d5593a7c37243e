use std::{
    fs,
    path::PathBuf,
    process::{Command, Output},
    time::{SystemTime, UNIX_EPOCH},
};

const ENV_VARS: &[&str] = &[
    "MAUTIC_DB_HOST",
    "MAUTIC_DB_PORT",
    "MAUTIC_DB_NAME",
    "MAUTIC_DB_USER",
    "MAUTIC_DB_PASS",
    "MAUTIC_TABLE_PREFIX",
    "MAUTIC_EXPORTER_LISTEN",
    "MAUTIC_SCRAPE_TIMEOUT",
];

fn make_temp_dir() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("mautic_exporter_bin_test_{}", nanos));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn run(args: &[&str]) -> Output {
    let root = make_temp_dir();
    let mut command = Command::new(env!("CARGO_BIN_EXE_mautic_exporter"));
    command.current_dir(&root).args(args);
    for var in ENV_VARS {
        command.env_remove(var);
    }
    let output = command.output().expect("failed to run mautic_exporter");
    let _ = fs::remove_dir_all(&root);
    output
}

#[test]
fn cli_main_requires_db() {
    let output = run(&["--user", "exporter"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--db"), "stderr: {}", stderr);
}

#[test]
fn cli_main_requires_user() {
    let output = run(&["--db", "mautic"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--user"), "stderr: {}", stderr);
}

#[test]
fn cli_main_rejects_unsafe_table_prefix() {
    let output = run(&["--db", "mautic", "--user", "exporter", "--tableprefix", "x; DROP"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("prefix"), "stderr: {}", stderr);
}

#[test]
fn cli_main_prints_help() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--tableprefix"));
    assert!(stdout.contains("--listen"));
}
