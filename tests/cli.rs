use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Run `rival` inside `dir` with a clean provider environment.
fn run_rival(dir: &Path, args: &[&str]) -> (String, String, bool) {
    run_rival_with_env(dir, args, &[])
}

fn run_rival_with_env(dir: &Path, args: &[&str], envs: &[(&str, &str)]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_rival"))
        .current_dir(dir)
        .args(args)
        .env_remove("COHERE_API_KEY")
        .env_remove("RIVAL_CSV_PATH")
        .env_remove("RIVAL_COHERE_URL")
        .env_remove("RIVAL_LOG")
        .env_remove("RUST_LOG")
        .envs(envs.iter().copied())
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rival: {}", e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_data_creates_sample_dataset() {
    let tmp = TempDir::new().unwrap();
    let csv = tmp.path().join("data").join("competitors.csv");

    let (stdout, stderr, success) =
        run_rival(tmp.path(), &["data", "--csv", csv.to_str().unwrap()]);
    assert!(success, "data failed: stdout={}, stderr={}", stdout, stderr);
    assert!(csv.exists());
    assert!(stdout.contains("Records:     10"));
    assert!(stdout.contains("Skipped:     0"));
    assert!(stdout.contains("TechCorp"));
}

#[test]
fn test_data_init_leaves_existing_file_alone() {
    let tmp = TempDir::new().unwrap();
    let csv = tmp.path().join("mine.csv");
    fs::write(
        &csv,
        "Competitor Name,Product Description,Marketing Strategy,Financial Summary\n\
         Acme,Widgets,Billboards,Revenue $1M\n\
         Broken,,Radio,Revenue $2M\n",
    )
    .unwrap();

    let (stdout, stderr, success) =
        run_rival(tmp.path(), &["data", "--init", "--csv", csv.to_str().unwrap()]);
    assert!(success, "data failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("already exists"));
    assert!(stdout.contains("Records:     1"));
    assert!(stdout.contains("Skipped:     1"));
}

#[test]
fn test_data_rejects_missing_columns() {
    let tmp = TempDir::new().unwrap();
    let csv = tmp.path().join("bad.csv");
    fs::write(&csv, "Competitor Name,Notes\nAcme,hello\n").unwrap();

    let (_stdout, stderr, success) = run_rival(tmp.path(), &["data", "--csv", csv.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("missing required columns"));
    assert!(stderr.contains("Financial Summary"));
}

#[test]
fn test_ask_without_api_key_fails() {
    let tmp = TempDir::new().unwrap();

    let (_stdout, stderr, success) = run_rival(tmp.path(), &["ask", "Who leads the market?"]);
    assert!(!success);
    assert!(stderr.contains("COHERE_API_KEY"));
}

#[test]
fn test_ask_rejects_blank_query_before_loading_data() {
    let tmp = TempDir::new().unwrap();

    // nothing listens on the discard port, so any provider call would fail
    let (_stdout, stderr, success) = run_rival_with_env(
        tmp.path(),
        &["ask", "   "],
        &[
            ("COHERE_API_KEY", "test-key-0123456789"),
            ("RIVAL_COHERE_URL", "http://127.0.0.1:9"),
        ],
    );
    assert!(!success);
    assert!(stderr.contains("Please enter a question"), "stderr={}", stderr);
    assert!(!stderr.contains("Loading competitor data"));
    assert!(!tmp.path().join("data").exists());
}

#[test]
fn test_config_file_is_validated() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("rival.toml");
    fs::write(&config, "[generation]\ntemperature = 1.5\n").unwrap();

    let (_stdout, stderr, success) = run_rival(tmp.path(), &["data"]);
    assert!(!success);
    assert!(stderr.contains("temperature"));
}

#[test]
fn test_config_file_sets_csv_path() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("custom.toml");
    fs::write(&config, "[data]\ncsv_path = \"from_config.csv\"\n").unwrap();

    let (stdout, stderr, success) = run_rival(
        tmp.path(),
        &["--config", config.to_str().unwrap(), "data"],
    );
    assert!(success, "data failed: stdout={}, stderr={}", stdout, stderr);
    assert!(tmp.path().join("from_config.csv").exists());
}
