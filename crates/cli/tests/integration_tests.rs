/// Integration tests for the tstore CLI
/// Tests cover: appends, nearest-sample lookups, range reads, paging, clear, stress, errors
use std::path::Path;
use tempfile::tempdir;

/// Helper to run CLI commands and capture output
fn run_cli_command(cache_dir: &Path, command: &str) -> String {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let mut child = Command::new(env!("CARGO_BIN_EXE_cli"))
        .env("TSTORE_CACHE_DIR", cache_dir)
        .env("TSTORE_SLOT_SIZE", "8") // tiny slots so paging starts early
        .env("TSTORE_BLOCK_SIZE", "2")
        .env("TSTORE_LOG", "off")
        .env_remove("TSTORE_PATH")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI");

    {
        let stdin = child.stdin.as_mut().expect("Failed to open stdin");
        stdin
            .write_all(command.as_bytes())
            .expect("Failed to write to stdin");
        stdin.write_all(b"EXIT\n").expect("Failed to write EXIT");
    }

    let output = child.wait_with_output().expect("Failed to read output");
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Splits the output into one response per command, dropping the banner.
fn responses(output: &str) -> Vec<String> {
    output
        .split("> ")
        .skip(1)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn five_samples() -> &'static str {
    "APPEND 10 2\nAPPEND 20 2\nAPPEND 30\n"
}

#[test]
fn test_append_and_lookup() {
    let dir = tempdir().unwrap();
    let commands = format!("{}BEFORE 21\nAFTER 21\nBEFORE 9\nAFTER 9\n", five_samples());
    let out = responses(&run_cli_command(dir.path(), &commands));

    assert_eq!(out[..3], ["OK", "OK", "OK"]);
    assert_eq!(out[3], "3");
    assert_eq!(out[4], "4");
    assert_eq!(out[5], "(none)");
    assert_eq!(out[6], "0");
    assert_eq!(out[7], "bye");
}

#[test]
fn test_before_with_explicit_max() {
    let dir = tempdir().unwrap();
    let commands = format!("{}BEFORE 100 2\nAFTER 100\n", five_samples());
    let out = responses(&run_cli_command(dir.path(), &commands));

    assert_eq!(out[3], "2");
    assert_eq!(out[4], "4");
}

#[test]
fn test_get_and_range() {
    let dir = tempdir().unwrap();
    let commands = format!("{}GET 3\nGET 5\nRANGE 0 4\nRANGE 6 9\n", five_samples());
    let out = responses(&run_cli_command(dir.path(), &commands));

    assert_eq!(out[3], "20");
    assert_eq!(out[4], "(nil)");
    assert_eq!(out[5], "10 10 20 20 30");
    assert_eq!(out[6], "(empty)");
}

#[test]
fn test_empty_store() {
    let dir = tempdir().unwrap();
    let out = responses(&run_cli_command(dir.path(), "BEFORE 5\nAFTER 5\nGET 0\n"));

    assert_eq!(out[..3], ["(none)", "(none)", "(nil)"]);
}

#[test]
fn test_paged_slots_read_back() {
    let dir = tempdir().unwrap();
    let mut commands = String::new();
    for i in 0..40 {
        commands.push_str(&format!("APPEND {}\n", i * 10));
    }
    commands.push_str("RANGE 0 3\nBEFORE 35\nSTATS\n");
    let out = responses(&run_cli_command(dir.path(), &commands));

    assert_eq!(out[40], "0 10 20 30");
    assert_eq!(out[41], "3");
    assert!(out[42].contains("samples=40 records=40"));
    assert!(out[42].contains("allocated=5"));
}

#[test]
fn test_repeated_timestamp_widens() {
    let dir = tempdir().unwrap();
    let out = responses(&run_cli_command(
        dir.path(),
        "APPEND 500 3\nAPPEND 500 2\nSTATS\n",
    ));

    assert!(out[2].contains("samples=5 records=1 first=500 last=500"));
}

#[test]
fn test_clear() {
    let dir = tempdir().unwrap();
    let commands = format!("{}CLEAR\nBEFORE 30\nGET 0\nSTATS\nAPPEND 7\nGET 0\n", five_samples());
    let out = responses(&run_cli_command(dir.path(), &commands));

    assert_eq!(out[3], "OK");
    assert_eq!(out[4], "(none)");
    assert_eq!(out[5], "(nil)");
    assert!(out[6].contains("samples=0 records=0"));
    assert_eq!(out[7], "OK");
    assert_eq!(out[8], "7");
}

#[test]
fn test_reads_follow_appends_and_clear() {
    let dir = tempdir().unwrap();
    let commands = format!(
        "{}RANGE 0 4\nAPPEND 40\nRANGE 0 5\nGET 5\nCLEAR\nAPPEND 1 3\nRANGE 0 2\nGET 3\nGET 0\n",
        five_samples()
    );
    let out = responses(&run_cli_command(dir.path(), &commands));

    assert_eq!(out[3], "10 10 20 20 30");
    assert_eq!(out[4], "OK");
    assert_eq!(out[5], "10 10 20 20 30 40");
    assert_eq!(out[6], "40");
    assert_eq!(out[7], "OK");
    assert_eq!(out[8], "OK");
    assert_eq!(out[9], "1 1 1");
    assert_eq!(out[10], "(nil)");
    assert_eq!(out[11], "1");
    assert_eq!(out[12], "bye");
}

#[test]
fn test_rejects_older_timestamp() {
    let dir = tempdir().unwrap();
    let out = responses(&run_cli_command(dir.path(), "APPEND 50\nAPPEND 40\nSTATS\n"));

    assert!(out[1].starts_with("ERR"));
    assert!(out[2].contains("samples=1"));
}

#[test]
fn test_usage_errors() {
    let dir = tempdir().unwrap();
    let out = responses(&run_cli_command(
        dir.path(),
        "APPEND\nAPPEND x\nGET\nRANGE 5 1\nBOGUS\n",
    ));

    assert!(out[0].starts_with("ERR usage: APPEND"));
    assert!(out[1].starts_with("ERR usage: APPEND"));
    assert!(out[2].starts_with("ERR usage: GET"));
    assert!(out[3].starts_with("ERR usage: RANGE"));
    assert_eq!(out[4], "unknown command: BOGUS");
}

#[test]
fn test_stress_command() {
    let dir = tempdir().unwrap();
    let out = responses(&run_cli_command(dir.path(), "STRESS 2000 2\n"));

    assert!(out[0].starts_with("OK (samples=2000"));
    assert!(!dir.path().join("stress.bin").exists());
}

#[test]
fn test_exit_deletes_cache_file() {
    let dir = tempdir().unwrap();
    let output = run_cli_command(dir.path(), five_samples());

    assert!(output.contains("tstore started"));
    assert!(output.contains("bye"));
    assert!(!dir.path().join("timestamps.bin").exists());
}
