use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Nothing listens on the discard port, so connections are refused at once
const UNREACHABLE_CONFIG: &str = r#"
[delivery]
endpoint_url = "http://127.0.0.1:9/log"
request_timeout_ms = 2000
"#;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
        }
    }

    /// Write the default config file
    fn with_config(self, contents: &str) -> Self {
        let path = self.xdg_config.join("sheetlog/config.toml");
        fs::create_dir_all(path.parent().expect("missing config parent"))
            .expect("failed to create config directory");
        fs::write(&path, contents).expect("failed to write config");
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(assert_cmd::cargo::cargo_bin!("sheetlog"));
        command
            .args(args)
            .env("HOME", &self.home)
            .env("XDG_CONFIG_HOME", &self.xdg_config)
            .env("XDG_STATE_HOME", &self.xdg_state)
            .env_remove("RUST_LOG");
        command
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    env.command(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute sheetlog: {e}"))
}

fn run_with_stdin(env: &CliTestEnv, args: &[&str], input: &str) -> Output {
    let mut child = env
        .command(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("failed to spawn sheetlog: {e}"));

    child
        .stdin
        .take()
        .expect("stdin not piped")
        .write_all(input.as_bytes())
        .expect("failed to write stdin");

    child.wait_with_output().expect("failed to wait for sheetlog")
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "sheetlog {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn status_prints_default_configuration() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["status"]);
    assert_success(&["status"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Delivery Configuration"));
    assert!(stdout.contains("Endpoint:        https://localhost:5555/log"));
    assert!(stdout.contains("Batch interval:  1000ms"));
    assert!(stdout.contains("Tier 2: every 3000ms for 900000ms"));
    assert!(stdout.contains("Tier 3: every 60000ms"));

    let log_line = stdout
        .lines()
        .find(|line| line.starts_with("Log file:"))
        .expect("missing log file line");
    let log_dir = env.xdg_state.join("sheetlog");
    assert!(log_line.contains(&*log_dir.to_string_lossy()), "{log_line}");
    assert!(log_line.contains("sheetlog.log."), "{log_line}");
}

#[test]
fn status_honours_config_file_overrides() {
    let env = CliTestEnv::new().with_config(
        r#"
[delivery]
endpoint_url = "http://collector.internal:8080/log"
batch_interval_ms = 250

[delivery.retry]
tier1_interval_ms = 500
"#,
    );

    let output = run_bin(&env, &["status"]);
    assert_success(&["status"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Endpoint:        http://collector.internal:8080/log"));
    assert!(stdout.contains("Batch interval:  250ms"));
    assert!(stdout.contains("Tier 1: every 500ms for 900000ms"));
    // untouched values keep their defaults
    assert!(stdout.contains("Poll interval:   1000ms"));
}

#[test]
fn explicit_config_path_is_used() {
    let env = CliTestEnv::new();
    let path = env.xdg_state.join("custom.toml");
    fs::write(&path, "[delivery]\nthrottle_window_ms = 75\n").expect("failed to write config");
    let path = path.to_string_lossy().into_owned();

    let args = ["--config", path.as_str(), "status"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Throttle window: 75ms"));
}

#[test]
fn invalid_config_is_rejected() {
    let env = CliTestEnv::new().with_config("[delivery]\nbatch_interval_ms = 0\n");

    let output = run_bin(&env, &["status"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("batch_interval_ms must be greater than 0"),
        "unexpected stderr:\n{stderr}"
    );
}

#[test]
fn probe_fails_against_unreachable_collector() {
    let env = CliTestEnv::new().with_config(UNREACHABLE_CONFIG);

    let output = run_bin(&env, &["probe"]);
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Collector unreachable at http://127.0.0.1:9/log"));
}

#[test]
fn run_shuts_down_on_end_of_input() {
    let env = CliTestEnv::new().with_config(UNREACHABLE_CONFIG);
    let input = concat!(
        r#"{"kind":"set_selection","range":{"address":"Sheet1!A1","rowCount":1,"columnCount":1,"values":[[1]]}}"#,
        "\n",
        r#"{"kind":"document_saved"}"#,
        "\n",
        "not json\n",
    );

    let output = run_with_stdin(&env, &["run"], input);
    assert_success(&["run"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Delivery client initialized"));
    assert!(stdout.contains("Delivered 0 event(s) in 0 batch(es)"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Skipping unrecognized input"));

    assert!(env.xdg_state.join("sheetlog").exists());
}
