use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

fn create_test_file(name: &str, content: &str) -> PathBuf {
    let tmp_dir = std::env::temp_dir().join(format!("crossmode-cli-{}", std::process::id()));
    fs::create_dir_all(&tmp_dir).ok();
    let path = tmp_dir.join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}

fn run_crossmode(args: &[&str]) -> (Output, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_crossmode"))
        .args(args)
        .output()
        .expect("Failed to execute crossmode");

    let text = String::from_utf8_lossy(&output.stderr).to_string() + &String::from_utf8_lossy(&output.stdout);
    (output, text)
}

const CONFIG: &str = r#"
[general]
callsign = "M0ABC"
dmr_id = 2345001

[dmr]
local_address = "127.0.0.1:0"
remote_address = "127.0.0.1:62032"

[ysf]
local_address = "127.0.0.1:0"
remote_address = "127.0.0.1:42000"
"#;

#[test]
fn test_check_valid_config() {
    let config = create_test_file("valid.toml", CONFIG);
    let (output, text) = run_crossmode(&[config.to_str().unwrap(), "--check"]);

    assert!(output.status.success(), "check failed: {}", text);
    assert!(text.contains("Configuration OK"), "unexpected output: {}", text);
    assert!(text.contains("M0ABC (DMR ID 2345001)"), "unexpected output: {}", text);
}

#[test]
fn test_check_with_route_and_id_files() {
    let routes = create_test_file("routes.txt", "# tg;room\n91;21080\n");
    let ids = create_test_file("ids.csv", "2345001,M0ABC,Alice\n");
    let config = format!(
        "{}\n[routing]\nfile = {:?}\n\n[lookup]\nfile = {:?}\n",
        CONFIG,
        routes.to_str().unwrap(),
        ids.to_str().unwrap()
    );
    let config = create_test_file("with_files.toml", &config);
    let (output, text) = run_crossmode(&[config.to_str().unwrap(), "--check"]);

    assert!(output.status.success(), "check failed: {}", text);
}

#[test]
fn test_check_rejects_bad_route_file() {
    let routes = create_test_file("bad_routes.txt", "91-21080\n");
    let config = format!("{}\n[routing]\nfile = {:?}\n", CONFIG, routes.to_str().unwrap());
    let config = create_test_file("bad_routes.toml", &config);
    let (output, text) = run_crossmode(&[config.to_str().unwrap(), "--check"]);

    assert!(!output.status.success());
    assert!(text.contains("talkgroup;room"), "unexpected output: {}", text);
}

#[test]
fn test_invalid_slot_exits_non_zero() {
    let config = create_test_file("bad_slot.toml", &CONFIG.replace("[dmr]\n", "[dmr]\nslot = 3\n"));
    let (output, text) = run_crossmode(&[config.to_str().unwrap(), "--check"]);

    assert!(!output.status.success());
    assert!(text.contains("dmr.slot"), "unexpected output: {}", text);
}

#[test]
fn test_missing_config_exits_non_zero() {
    let (output, _) = run_crossmode(&["/nonexistent/crossmode.toml"]);
    assert!(!output.status.success());
}

#[test]
fn test_missing_argument_shows_usage() {
    let (output, text) = run_crossmode(&[]);
    assert!(!output.status.success());
    assert!(text.contains("Usage"), "unexpected output: {}", text);
}
