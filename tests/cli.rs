//! End-to-end runs of the `twinspect` binary.

use std::fs;
use std::path::PathBuf;
use std::process::Output;

use tempfile::TempDir;

fn run(source_a: &str, source_b: &str, extra: &[&str]) -> Output {
    let dir = TempDir::new().unwrap();
    let path_a = write_source(&dir, "a.py", source_a);
    let path_b = write_source(&dir, "b.py", source_b);
    std::process::Command::new(env!("CARGO_BIN_EXE_twinspect"))
        .arg(&path_a)
        .arg(&path_b)
        .args(extra)
        .output()
        .unwrap()
}

fn write_source(dir: &TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, source).unwrap();
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_identical_files_are_type1() {
    let source = "def f(x):\n    if x > 0:\n        return x\n    return -x\n";
    let output = run(source, source, &[]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Type 1"), "unexpected report:\n{text}");
    assert!(text.contains("EQUIVALENT"));
}

#[test]
fn test_renamed_function_is_type2() {
    let a = "def total(count):\n    result = count + 1\n    return result\n";
    let b = "def sum_up(n):\n    r = n + 1\n    return r\n";
    let output = run(a, b, &[]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Type 2"));
}

#[test]
fn test_reordered_statements_are_type3() {
    let a = "def f(x):\n    a = x + 1\n    b = x * 2\n    return a + b\n";
    let b = "def f(x):\n    b = x * 2\n    a = x + 1\n    return a + b\n";
    let output = run(a, b, &[]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Type 3"));
}

#[test]
fn test_factorial_pair_is_type4() {
    let iterative =
        "def fact_it(n):\n    r = 1\n    for i in range(1, n + 1):\n        r *= i\n    return r\n";
    let recursive =
        "def fact_rec(n):\n    if n <= 1:\n        return 1\n    return n * fact_rec(n - 1)\n";
    let output = run(iterative, recursive, &[]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Type 4"), "unexpected report:\n{text}");
}

#[test]
fn test_offset_difference_is_no_clone_with_counterexample() {
    let a = "def f(x):\n    return x + 1\n";
    let b = "def g(x):\n    return x + 2\n";
    let output = run(a, b, &[]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("No clone"));
    assert!(text.contains("NOT EQUIVALENT"));
    assert!(text.contains("x = 0"), "counterexample missing:\n{text}");
}

#[test]
fn test_signature_mismatch_is_no_clone() {
    let a = "def f(x):\n    return x + 1\n";
    let b = "def g(x, y):\n    return x + y\n";
    let output = run(a, b, &[]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("No clone"));
    assert!(text.contains("arity"));
}

#[test]
fn test_raising_the_bound_resolves_unknown() {
    let looped = "def f(x):\n    t = 0\n    for i in range(12):\n        t += x\n    return t\n";
    let closed = "def g(x):\n    return x * 12\n";

    let short = run(looped, closed, &[]);
    assert!(short.status.success());
    assert!(stdout(&short).contains("Unknown"));

    let long = run(looped, closed, &["--bound", "15"]);
    assert!(long.status.success());
    assert!(stdout(&long).contains("Type 4"));
}

#[test]
fn test_parse_error_fails_with_diagnostic() {
    let output = run("def f(:\n    return 1\n", "def g(x):\n    return x\n", &[]);
    assert!(!output.status.success());
    assert!(!output.stderr.is_empty());
}

#[test]
fn test_unsupported_construct_fails() {
    let a = "def f(xs):\n    return xs[0]\n";
    let b = "def g(xs):\n    y = xs[0]\n    return y\n";
    let output = run(a, b, &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported"), "stderr was:\n{stderr}");
}

#[test]
fn test_missing_file_fails() {
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_twinspect"))
        .args(["/nonexistent/a.py", "/nonexistent/b.py"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot read"));
}

#[test]
fn test_unknown_solver_is_rejected() {
    let output = run(
        "def f(x):\n    return x\n",
        "def g(x):\n    return x\n",
        &["--solver", "oracle"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown solver"));
}

#[test]
fn test_json_report_shape() {
    let a = "def f(x):\n    return x + 1\n";
    let b = "def g(y):\n    return y - (-1)\n";
    let output = run(a, b, &["--json"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.trim_start().starts_with('{'));
    assert!(text.contains("\"verdict\": \"EQUIVALENT\""));
    assert!(text.contains("\"classification\""));
    assert!(text.contains("\"clone\": true"));
    assert!(text.contains("\"solver\": \"builtin\""));
}

#[test]
fn test_verbose_lists_paths() {
    let a = "def f(x):\n    if x > 0:\n        return 1\n    return 0\n";
    let b = "def g(y):\n    if y > 0:\n        return 1\n    else:\n        return 0\n";
    let output = run(a, b, &["--verbose"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Paths of"), "verbose paths missing:\n{text}");
    assert!(text.contains("(x > 0)"));
}
