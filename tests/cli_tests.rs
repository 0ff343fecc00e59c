//! Tests for the `pshufb-const` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

fn pshufb_const(args: &[&Path]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pshufb-const"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run pshufb-const")
}

#[test]
fn test_prints_tables_in_argument_order() {
    let identity = fixture("identity.c");
    let repeat = fixture("repeat.c");
    let output = pshufb_const(&[&repeat, &identity]);
    assert!(output.status.success(), "{output:?}");
    assert!(output.stderr.is_empty());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let headers: Vec<&str> = stdout.lines().filter(|l| l.starts_with("// ")).collect();
    assert_eq!(
        headers,
        vec![
            format!("// {}", repeat.display()),
            format!("// {}", identity.display())
        ]
    );
    assert_eq!(stdout.matches(");\n").count(), 3);
    assert!(stdout.ends_with("    0x3f3e3d3c3b3a3938\n);\n"));
}

#[test]
fn test_failure_exits_with_status_one() {
    let identity = fixture("identity.c");
    let unclosed = fixture("unclosed.c");
    let output = pshufb_const(&[&identity, &unclosed]);
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.matches("const __m512i").count(), 1);
    assert!(!stdout.contains(&unclosed.display().to_string()));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.starts_with("Error: "), "{stderr}");
    assert!(stderr.contains("comment block is not closed"), "{stderr}");
}

#[test]
fn test_invalid_snippet_reports_location() {
    let path = std::env::temp_dir().join(format!("pshufb-const-cli-{}.c", std::process::id()));
    fs::write(&path, "int a;\n/** pshufb\n    t = [i for i in range(64)\n*/\n").unwrap();
    let output = pshufb_const(&[&path]);
    fs::remove_file(&path).ok();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(
        stderr.contains(&format!("{}:2: cannot evaluate program", path.display())),
        "{stderr}"
    );
}

#[test]
fn test_deep_nesting_is_an_error_not_a_crash() {
    let path = std::env::temp_dir().join(format!("pshufb-const-deep-{}.c", std::process::id()));
    let depth = 2000;
    let text = format!(
        "/** pshufb\nt = {}0{}\n*/\n",
        "(".repeat(depth),
        ")".repeat(depth)
    );
    fs::write(&path, text).unwrap();
    let output = pshufb_const(&[&path]);
    fs::remove_file(&path).ok();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.starts_with("Error: "), "{stderr}");
    assert!(stderr.contains("nested too deeply"), "{stderr}");
}

#[test]
fn test_requires_a_file() {
    let output = pshufb_const(&[]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
