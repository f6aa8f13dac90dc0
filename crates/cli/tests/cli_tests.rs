// Integration tests driving the `cellcast` binary against scratch settings files.
// Run with: cargo test -p cellcast-cli --test cli_tests -- --nocapture

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self { dir: TempDir::new().unwrap() }
    }

    fn settings(&self) -> PathBuf {
        self.dir.path().join("settings.json")
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_cellcast"));
        cmd.env_remove("CELLCAST_SETTINGS")
            .env_remove("RUST_LOG")
            .arg("--settings")
            .arg(self.settings());
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.cmd().args(args).output().expect("run cellcast")
    }

    fn ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "cellcast {:?} failed with {:?}: {}",
            args,
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    fn stored(&self) -> serde_json::Value {
        let text = std::fs::read_to_string(self.settings()).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

// ---------------------------------------------------------------------------
// settings editing
// ---------------------------------------------------------------------------

#[test]
fn init_writes_defaults_and_refuses_overwrite() {
    let env = Env::new();
    env.ok(&["init"]);

    let stored = env.stored();
    assert_eq!(stored["obs_settings"]["host"], "localhost");
    assert_eq!(stored["obs_settings"]["port"], "4444");
    assert_eq!(stored["mapping_groups"][0]["group_name"], "Default Group");

    let again = env.run(&["init"]);
    assert_eq!(again.status.code(), Some(2));
    env.ok(&["init", "--force"]);
}

#[test]
fn group_and_mapping_edits_persist() {
    let env = Env::new();
    env.ok(&["init"]);
    env.ok(&["group", "add", "Scoreboard"]);
    env.ok(&["mapping", "add", "--group", "2", "--target", "HomeScore", "--row", "2", "--col", "3"]);
    env.ok(&["mapping", "add", "--group", "2", "--target", "Logo", "--row", "4", "--col", "1", "--kind", "image", "--manual"]);
    env.ok(&["mapping", "edit", "2", "1", "--row", "5"]);
    env.ok(&["group", "collapse", "2"]);

    let stored = env.stored();
    let group = &stored["mapping_groups"][1];
    assert_eq!(group["group_name"], "Scoreboard");
    assert_eq!(group["collapsed"], true);
    assert_eq!(group["mappings"][0]["name"], "HomeScore");
    assert_eq!(group["mappings"][0]["row"], "5");
    assert_eq!(group["mappings"][0]["auto_update"], 1);
    assert_eq!(group["mappings"][1]["type"], "Image");
    assert_eq!(group["mappings"][1]["auto_update"], 0);

    env.ok(&["mapping", "remove", "2", "1"]);
    env.ok(&["group", "remove", "1"]);
    let stored = env.stored();
    assert_eq!(stored["mapping_groups"].as_array().unwrap().len(), 1);
    assert_eq!(stored["mapping_groups"][0]["mappings"][0]["name"], "Logo");
}

#[test]
fn bad_coordinates_and_indices_are_usage_errors() {
    let env = Env::new();
    env.ok(&["init"]);

    let zero = env.run(&["mapping", "add", "--target", "X", "--row", "0", "--col", "1"]);
    assert_eq!(zero.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&zero.stderr).contains("row '0'"));

    let text = env.run(&["mapping", "add", "--target", "X", "--row", "1", "--col", "abc"]);
    assert_eq!(text.status.code(), Some(2));

    assert_eq!(env.run(&["group", "rename", "7", "Nope"]).status.code(), Some(2));
    assert_eq!(env.run(&["mapping", "remove", "1", "1"]).status.code(), Some(2));

    let stored = env.stored();
    assert!(stored["mapping_groups"][0]["mappings"].as_array().unwrap().is_empty());
}

#[test]
fn invalid_settings_file_exits_3() {
    let env = Env::new();
    std::fs::write(env.settings(), "{ not json").unwrap();
    let output = env.run(&["show"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn import_wraps_legacy_mappings() {
    let env = Env::new();
    let legacy = env.file("legacy.json");
    std::fs::write(
        &legacy,
        r#"{
            // exported by an older release
            "obs_settings": {"host": "studio", "port": 4455, "password": "pw"},
            "mappings": [
                {"type": "Browser", "name": "Ticker", "row": 3, "col": 2, "auto_update": "0"}
            ]
        }"#,
    )
    .unwrap();

    env.ok(&["import", arg(&legacy)]);

    let stored = env.stored();
    assert_eq!(stored["obs_settings"]["port"], "4455");
    let group = &stored["mapping_groups"][0];
    assert_eq!(group["group_name"], "Default Group");
    assert_eq!(group["mappings"][0]["type"], "Browser URL");
    assert_eq!(group["mappings"][0]["row"], "3");
    assert_eq!(group["mappings"][0]["auto_update"], 0);
}

#[test]
fn export_uses_four_space_indent() {
    let env = Env::new();
    env.ok(&["init"]);
    let out = env.file("out.json");
    env.ok(&["export", arg(&out)]);

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("{\n    \"obs_settings\": {\n        \"host\""));
    assert!(text.ends_with("}\n"));
}

#[test]
fn show_masks_password() {
    let env = Env::new();
    env.ok(&["init"]);
    env.ok(&["connection", "--password", "hunter2"]);

    let json = env.ok(&["show", "--json"]);
    assert!(!json.contains("hunter2"));
    let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(doc["obs_settings"]["password"], "********");

    let text = env.ok(&["show"]);
    assert!(text.contains("password set"));
    assert_eq!(env.stored()["obs_settings"]["password"], "hunter2");
}

// ---------------------------------------------------------------------------
// preview
// ---------------------------------------------------------------------------

#[test]
fn preview_csv_reports_values_and_markers() {
    let env = Env::new();
    let csv = env.file("scores.csv");
    std::fs::write(&csv, "Team,Score\nHome,3\nAway,1\n").unwrap();

    env.ok(&["init"]);
    env.ok(&["source", "--file", arg(&csv)]);
    env.ok(&["mapping", "add", "--target", "HomeName", "--row", "2", "--col", "1"]);
    env.ok(&["mapping", "add", "--target", "HomeScore", "--row", "2", "--col", "2"]);
    env.ok(&["mapping", "add", "--target", "Far", "--row", "40", "--col", "1"]);

    let json = env.ok(&["preview", "--json"]);
    let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(doc["shape"]["rows"], 3);
    assert_eq!(doc["mappings"][0]["value"], "Home");
    assert_eq!(doc["mappings"][1]["value"], "3");
    assert_eq!(doc["mappings"][2]["marker"], "Range?");
    assert!(doc["read_error"].is_null());
}

#[test]
fn preview_xlsx_sheet() {
    let env = Env::new();
    let path = env.file("board.xlsx");
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Board").unwrap();
    sheet.write_string(0, 0, "Period").unwrap();
    sheet.write_number(0, 1, 2.0).unwrap();
    sheet.write_boolean(1, 0, true).unwrap();
    workbook.save(&path).unwrap();

    env.ok(&["init"]);
    env.ok(&["source", "--file", arg(&path), "--sheet", "Board"]);
    env.ok(&["mapping", "add", "--target", "Period", "--row", "1", "--col", "2"]);
    env.ok(&["mapping", "add", "--target", "Live", "--row", "2", "--col", "1"]);

    let text = env.ok(&["preview"]);
    assert!(text.contains("= '2'"), "{}", text);
    assert!(text.contains("= 'TRUE'"), "{}", text);
}

#[test]
fn preview_missing_sheet_exits_5() {
    let env = Env::new();
    let path = env.file("board.xlsx");
    let mut workbook = rust_xlsxwriter::Workbook::new();
    workbook.add_worksheet().write_string(0, 0, "x").unwrap();
    workbook.save(&path).unwrap();

    env.ok(&["init"]);
    env.ok(&["source", "--file", arg(&path), "--sheet", "Nope"]);
    env.ok(&["mapping", "add", "--target", "A", "--row", "1", "--col", "1"]);

    let output = env.run(&["preview", "--json"]);
    assert_eq!(output.status.code(), Some(5));
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(doc["read_error"].as_str().unwrap().contains("Sheet 'Nope' not found"));
    assert_eq!(doc["mappings"][0]["marker"], "Read?");
}

#[test]
fn preview_without_source_exits_3() {
    let env = Env::new();
    env.ok(&["init"]);
    let output = env.run(&["preview"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("hint:"));
}

// ---------------------------------------------------------------------------
// target
// ---------------------------------------------------------------------------

#[test]
fn sync_without_server_exits_4() {
    let env = Env::new();
    env.ok(&["init"]);
    env.ok(&["connection", "--host", "127.0.0.1", "--port", "1"]);
    let output = env.run(&["sync"]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn run_reads_commands_until_quit() {
    let env = Env::new();
    env.ok(&["init"]);
    env.ok(&["connection", "--host", "127.0.0.1", "--port", "1"]);
    env.ok(&["mapping", "add", "--target", "Clock", "--row", "1", "--col", "1"]);

    let mut child = env
        .cmd()
        .args(["run", "--interval-ms", "50"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"status\nsync\nquit\n").unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Connection: Disconnected"), "{}", stdout);
    assert!(stdout.contains("1.1 row 1 col 1 -> Clock [Text] = N/A"), "{}", stdout);
    assert!(stdout.contains("Not connected"), "{}", stdout);
}

impl Env {
    fn spawn_run(&self) -> std::process::Child {
        self.cmd()
            .args(["run", "--interval-ms", "50"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap()
    }

    fn run_script(&self, script: &str) -> String {
        let mut child = self.spawn_run();
        child.stdin.take().unwrap().write_all(script.as_bytes()).unwrap();
        let output = child.wait_with_output().unwrap();
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        String::from_utf8_lossy(&output.stdout).into_owned()
    }
}

#[test]
fn run_remove_drops_mapping_and_persists() {
    let env = Env::new();
    env.ok(&["init"]);
    env.ok(&["connection", "--host", "127.0.0.1", "--port", "1"]);
    env.ok(&["mapping", "add", "--target", "Clock", "--row", "1", "--col", "1"]);
    env.ok(&["mapping", "add", "--target", "Score", "--row", "2", "--col", "1"]);

    let stdout = env.run_script("remove 1 1\nremove 1 9\nstatus\nquit\n");
    assert!(stdout.contains("Removed mapping 1.1: row 1 col 1 -> Clock"), "{}", stdout);
    assert!(stdout.contains("1.1 row 2 col 1 -> Score [Text] = N/A"), "{}", stdout);
    assert!(!stdout.contains("-> Clock [Text] ="), "{}", stdout);

    let mappings = &env.stored()["mapping_groups"][0]["mappings"];
    assert_eq!(mappings.as_array().unwrap().len(), 1);
    assert_eq!(mappings[0]["name"], "Score");
}

#[test]
fn run_collapse_marks_group_and_persists() {
    let env = Env::new();
    env.ok(&["init"]);
    env.ok(&["connection", "--host", "127.0.0.1", "--port", "1"]);

    let stdout = env.run_script("collapse 1\nstatus\nquit\n");
    assert!(stdout.contains("1. Default Group (collapsed)"), "{}", stdout);
    assert_eq!(env.stored()["mapping_groups"][0]["collapsed"], true);
}

#[test]
fn run_import_replaces_live_mappings() {
    let env = Env::new();
    env.ok(&["init"]);
    env.ok(&["connection", "--host", "127.0.0.1", "--port", "1"]);
    env.ok(&["mapping", "add", "--target", "Clock", "--row", "1", "--col", "1"]);

    let other = env.file("other.json");
    std::fs::write(
        &other,
        r#"{
            "obs_settings": {"host": "127.0.0.1", "port": 1, "password": ""},
            "mapping_groups": [
                {"group_name": "Lower Third", "mappings": [
                    {"type": "Text", "name": "Ticker", "row": 3, "col": 2, "auto_update": 1}
                ]}
            ]
        }"#,
    )
    .unwrap();

    let script = format!("import {}\nstatus\nquit\n", arg(&other));
    let stdout = env.run_script(&script);
    assert!(stdout.contains("1. Lower Third"), "{}", stdout);
    assert!(stdout.contains("1.1 row 3 col 2 -> Ticker [Text] = N/A"), "{}", stdout);
    assert!(!stdout.contains("-> Clock [Text] ="), "{}", stdout);
    assert_eq!(env.stored()["mapping_groups"][0]["mappings"][0]["name"], "Ticker");
}

#[test]
fn run_reload_picks_up_edits_from_another_process() {
    let env = Env::new();
    env.ok(&["init"]);
    env.ok(&["connection", "--host", "127.0.0.1", "--port", "1"]);

    let mut child = env.spawn_run();
    let mut stdin = child.stdin.take().unwrap();
    let mut stdout = BufReader::new(child.stdout.take().unwrap());

    stdin.write_all(b"status\n").unwrap();
    let mut line = String::new();
    while !line.starts_with("Connection:") {
        line.clear();
        assert!(stdout.read_line(&mut line).unwrap() > 0, "run exited early");
    }

    env.ok(&["mapping", "add", "--target", "Late", "--row", "4", "--col", "4"]);
    stdin.write_all(b"reload\nstatus\nquit\n").unwrap();
    drop(stdin);

    let rest: Vec<String> = stdout.lines().map(|l| l.unwrap()).collect();
    assert!(child.wait().unwrap().success());
    let rest = rest.join("\n");
    assert!(rest.contains("Reloaded"), "{}", rest);
    assert!(rest.contains("1.1 row 4 col 4 -> Late [Text] = N/A"), "{}", rest);
}

#[test]
fn run_stops_at_end_of_input() {
    let env = Env::new();
    env.ok(&["init"]);
    env.ok(&["connection", "--host", "127.0.0.1", "--port", "1"]);

    let output = env
        .cmd()
        .arg("run")
        .stdin(Stdio::null())
        .output()
        .unwrap();
    assert!(output.status.success());
}
