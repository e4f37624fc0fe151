use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::tempdir;

const ADA: &str = r#"
name: Ada Lovelace
field: Systems Engineer
twitter: ada
github: adalovelace
stack: [python, rust]
"#;

fn write_file(path: &Path, contents: &str) {
    fs::write(path, contents).expect("file should write");
}

/// A working directory with a fast config and the Ada profile.
fn workspace() -> tempfile::TempDir {
    let dir = tempdir().expect("tempdir should create");
    write_file(&dir.path().join("bannerly.yaml"), "pacing_ms: 0\n");
    write_file(&dir.path().join("ada.yaml"), ADA);
    dir
}

fn run_bannerly(cwd: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_bannerly"))
        .current_dir(cwd)
        .args(args)
        .env_remove("BANNERLY_UPLOAD_URL")
        .env_remove("BANNERLY_UPLOAD_PRESET")
        .env("RUST_LOG", "off")
        .output()
        .expect("bannerly command should run")
}

fn error_envelope(output: &std::process::Output) -> Value {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with('{'))
        .unwrap_or_else(|| panic!("no json envelope on stderr: {stderr}"));
    serde_json::from_str(line).expect("envelope should parse")
}

#[test]
fn check_accepts_a_complete_profile() {
    let dir = workspace();
    let output = run_bannerly(dir.path(), &["check", "ada.yaml"]);
    assert!(output.status.success(), "check should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("OK: ada.yaml (Ada Lovelace, 2 stack entries"), "{stdout}");
}

#[test]
fn empty_name_is_a_validation_error_with_exit_code_2() {
    let dir = workspace();
    write_file(
        &dir.path().join("anon.yaml"),
        "name: \"\"\nfield: Systems Engineer\n",
    );
    let output = run_bannerly(dir.path(), &["render", "anon.yaml", "--json"]);
    assert_eq!(output.status.code(), Some(2));

    let envelope = error_envelope(&output);
    assert_eq!(envelope["ok"], Value::Bool(false));
    assert_eq!(envelope["error"]["code"], "VALIDATION_FAILED");
    assert_eq!(envelope["error"]["details"][0]["field"], "name");
    assert!(
        !dir.path().join("custom.png").exists(),
        "nothing should be exported"
    );
}

#[test]
fn render_writes_named_png_and_share_links() {
    let dir = workspace();
    let output = run_bannerly(
        dir.path(),
        &["render", "ada.yaml", "-o", "out", "--share", "--json"],
    );
    assert!(
        output.status.success(),
        "render should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout).expect("json should parse");
    assert_eq!(report["ok"], Value::Bool(true));
    assert_eq!(report["image"]["file_name"], "ada-lovelace-banner.png");
    assert_eq!(report["image"]["width"], 1500);
    assert_eq!(report["image"]["height"], 500);

    let twitter = report["share"]["twitter"].as_str().expect("twitter link");
    assert!(twitter.starts_with("https://x.com/intent/tweet?text=Check+out+my+new+customized+banner"));
    assert_eq!(twitter.matches("url=https%3A%2F%2Fbannerly.vercel.app").count(), 1);
    assert!(report["share"]["linkedin"].is_string());
    assert!(report["share"]["facebook"].is_string());

    let png = dir.path().join("out").join("ada-lovelace-banner.png");
    let decoded = image::open(&png).expect("png should decode");
    assert_eq!((decoded.width(), decoded.height()), (1500, 500));
}

#[test]
fn render_honours_size_overrides() {
    let dir = workspace();
    let output = run_bannerly(
        dir.path(),
        &["render", "ada.yaml", "--width", "600", "--height", "200"],
    );
    assert!(output.status.success(), "render should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Wrote "), "{stdout}");
    assert!(stdout.contains("(600x200)"), "{stdout}");
    assert!(dir.path().join("ada-lovelace-banner.png").is_file());
}

#[test]
fn names_with_path_separators_stay_in_the_output_directory() {
    let dir = workspace();
    write_file(
        &dir.path().join("band.yaml"),
        "name: \"/AC/DC Fan\"\nfield: Rock\n",
    );
    let output = run_bannerly(dir.path(), &["render", "band.yaml", "-o", "out"]);
    assert!(
        output.status.success(),
        "render should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(dir.path().join("out").join("ac-dc-fan-banner.png").is_file());
}

#[test]
fn share_builds_a_link_for_a_rendered_png() {
    let dir = workspace();
    let render = run_bannerly(dir.path(), &["render", "ada.yaml"]);
    assert!(render.status.success(), "render should succeed");

    let output = run_bannerly(
        dir.path(),
        &[
            "share",
            "linkedin",
            "ada-lovelace-banner.png",
            "--image-url",
            "https://cdn.example.com/ada.png",
        ],
    );
    assert!(output.status.success(), "share should succeed");
    let link = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    assert!(link.starts_with("https://www.linkedin.com/sharing/share-offsite/?url="));
    assert!(link.contains("url=https%3A%2F%2Fcdn.example.com%2Fada.png"), "{link}");

    let bad = run_bannerly(dir.path(), &["share", "myspace", "ada-lovelace-banner.png"]);
    assert_eq!(bad.status.code(), Some(2));
}

#[test]
fn layout_json_is_stable() {
    let dir = workspace();
    let first = run_bannerly(dir.path(), &["layout", "ada.yaml", "--json"]);
    let second = run_bannerly(dir.path(), &["layout", "ada.yaml", "--json"]);
    assert!(first.status.success(), "layout should succeed");
    assert_eq!(first.stdout, second.stdout, "json output should be stable");

    let tree: Value = serde_json::from_slice(&first.stdout).expect("json should parse");
    assert_eq!(tree["width"], 1500);
    assert_eq!(tree["background"]["kind"], "default_gradient");
    let titles: Vec<&Value> = tree["nodes"]
        .as_array()
        .expect("nodes array")
        .iter()
        .filter(|node| node["role"] == "title")
        .collect();
    assert_eq!(titles.len(), 1);
    assert_eq!(titles[0]["content"], "Ada Lovelace");
}

#[test]
fn unknown_theme_is_a_usage_error() {
    let dir = workspace();
    let output = run_bannerly(
        dir.path(),
        &["layout", "ada.yaml", "--theme", "sepia", "--json"],
    );
    assert_eq!(output.status.code(), Some(2));
    let envelope = error_envelope(&output);
    assert_eq!(envelope["error"]["code"], "INVALID_THEME");
    assert_eq!(envelope["error"]["details"]["provided"], "sepia");
}

#[test]
fn unknown_profile_field_reports_location() {
    let dir = workspace();
    write_file(
        &dir.path().join("typo.yaml"),
        "name: Ada\nfield: Engineer\nnickname: countess\n",
    );
    let output = run_bannerly(dir.path(), &["check", "typo.yaml"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 3"), "{stderr}");
}

#[test]
fn catalog_search_lists_matching_entries() {
    let dir = workspace();
    let output = run_bannerly(dir.path(), &["catalog", "--search", "RUST", "--json"]);
    assert!(output.status.success(), "catalog should succeed");
    let entries: Value = serde_json::from_slice(&output.stdout).expect("json should parse");
    let ids: Vec<&str> = entries
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|entry| entry["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["rust"]);
}

#[test]
fn version_includes_revision() {
    let dir = workspace();
    let output = run_bannerly(dir.path(), &["--version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with(&format!("bannerly {}", env!("CARGO_PKG_VERSION"))));
}
