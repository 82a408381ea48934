//! End-to-end tests that drive the compiled `quartzc` binary.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn quartzc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_quartzc"))
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    quartzc().args(args).output().expect("quartzc should run")
}

fn run_on(input: &Path, extra: &[&str]) -> Output {
    let mut args = vec!["--input".to_string(), input.display().to_string()];
    args.extend(extra.iter().map(|s| s.to_string()));
    quartzc().args(&args).output().expect("quartzc should run")
}

#[test]
fn valid_program_exits_zero() {
    let dir = TempDir::new().unwrap();
    let main = write_file(
        &dir,
        "main.qz",
        "proc ::main() -> i32 { let x: i32 = 1 + 2 * 3; return x; }",
    );

    let out = run_on(&main, &["--colours", "false"]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}

#[test]
fn parse_error_exits_nonzero_and_renders_context() {
    let dir = TempDir::new().unwrap();
    let main = write_file(&dir, "main.qz", "let x = 1 ? 2;\n");

    let out = run_on(&main, &["--colours", "false"]);
    assert!(!out.status.success());

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("main.qz"), "stderr: {stderr}");
    assert!(stderr.contains('^'), "stderr: {stderr}");
}

#[test]
fn missing_input_flag_is_a_usage_error() {
    let out = run(&[]);
    assert!(!out.status.success());
}

#[test]
fn nonexistent_input_file_fails() {
    let out = run(&["--input", "/nonexistent/never.qz", "--colours", "false"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("could not open"), "stderr: {stderr}");
}

#[test]
fn mismatched_output_count_fails() {
    let dir = TempDir::new().unwrap();
    let a = write_file(&dir, "a.qz", "let x = 1;");
    let b = write_file(&dir, "b.qz", "let y = 2;");

    let out = quartzc()
        .args([
            "--input",
            &a.display().to_string(),
            &b.display().to_string(),
            "--output",
            "only-one.o",
        ])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("does not match"), "stderr: {stderr}");
}

#[test]
fn dump_tokens_prints_the_stream() {
    let dir = TempDir::new().unwrap();
    let main = write_file(&dir, "main.qz", "let x = 42;");

    let out = run_on(&main, &["--dump-tokens", "--colours", "false"]);
    assert!(out.status.success());

    let stdout = String::from_utf8_lossy(&out.stdout);
    // let, x, =, 42, ;, EOF
    assert_eq!(stdout.lines().count(), 6);
    assert!(stdout.contains("IntLiteral"));
    assert!(stdout.contains("\"42\""));
    assert!(stdout.contains("Keyword"));
}

#[test]
fn dump_ast_serializes_the_forest() {
    let dir = TempDir::new().unwrap();
    let main = write_file(
        &dir,
        "main.qz",
        "proc ::main() -> i32 { return 1 + 2; }",
    );

    let out = run_on(&main, &["--dump-ast", "--colours", "false"]);
    assert!(out.status.success());

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("ProcDecl"), "stdout: {stdout}");
    assert!(stdout.contains("Return"));
    assert!(stdout.contains("BinExpr"));
}

#[test]
fn dump_entities_serializes_the_table() {
    let dir = TempDir::new().unwrap();
    let main = write_file(
        &dir,
        "main.qz",
        "namespace app { proc run() -> i32 { return 0; } }",
    );

    let out = run_on(&main, &["--dump-entities", "--colours", "false"]);
    assert!(out.status.success());

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("::app::run"), "stdout: {stdout}");
    assert!(stdout.contains("Static"));
    assert!(stdout.contains("::i32"));
}

#[test]
fn dump_context_prints_configuration_json() {
    let dir = TempDir::new().unwrap();
    let main = write_file(&dir, "main.qz", "let x = 1;");

    let out = run_on(&main, &["--dump-context", "--verbose", "--colours", "false"]);
    assert!(out.status.success());

    let stdout = String::from_utf8_lossy(&out.stdout);
    let json_start = stdout.find('{').expect("JSON object in output");
    let json_end = stdout.rfind('}').unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout[json_start..=json_end]).expect("valid JSON");

    assert!(parsed["flags"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f == "Verbose"));
    assert!(parsed["version"]["arch"].as_str().is_some());
}

#[test]
fn includes_pull_in_additional_files() {
    let dir = TempDir::new().unwrap();
    let lib = write_file(&dir, "lib.qz", "proc helper() -> void { return; }");
    let main = write_file(
        &dir,
        "main.qz",
        &format!(
            "@include \"{}\";\nproc main() -> void {{ return; }}",
            lib.display()
        ),
    );

    let out = run_on(&main, &["--dump-entities", "--colours", "false"]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("::main"));
    assert!(stdout.contains("::helper"));
}

#[test]
fn multiple_core_units_share_the_entity_table() {
    let dir = TempDir::new().unwrap();
    let a = write_file(&dir, "a.qz", "namespace shared { proc one() -> void { return; } }");
    let b = write_file(&dir, "b.qz", "namespace shared { proc two() -> void { return; } }");

    let out = quartzc()
        .args([
            "--input",
            &a.display().to_string(),
            &b.display().to_string(),
            "--dump-entities",
            "--colours",
            "false",
        ])
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("::shared::one"));
    assert!(stdout.contains("::shared::two"));
}

#[test]
fn warnings_do_not_change_the_exit_code() {
    // No construct currently emits warnings on its own; a clean parse
    // must exit zero even with --verbose chatter on stderr.
    let dir = TempDir::new().unwrap();
    let main = write_file(&dir, "main.qz", "let x = 1;");

    let out = run_on(&main, &["--verbose", "--colours", "false"]);
    assert!(out.status.success());
}

#[test]
fn version_flag_prints_and_exits_zero() {
    let out = run(&["--version"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("quartzc"));
}
