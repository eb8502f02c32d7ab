use std::{
    path::PathBuf,
    process::{Command, Output},
};

const MODEL: &str = "0.3 200000
3
0 0
1 0
0 1
1
0 1 2
2
0 3
1 3
1
2 0 -1000
";

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cstfem-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

fn cstfem(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cstfem"))
        .args(args)
        .arg("--quiet")
        .output()
        .unwrap()
}

#[test]
fn wrong_argument_count_prints_usage() {
    let out = Command::new(env!("CARGO_BIN_EXE_cstfem")).output().unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Usage"), "{stderr}");

    let input = scratch("only_input.txt");
    std::fs::write(&input, MODEL).unwrap();
    let out = cstfem(&[input.to_str().unwrap()]);
    assert!(!out.status.success());

    let out = cstfem(&[input.to_str().unwrap(), "a.txt", "b.txt"]);
    assert!(!out.status.success());
}

#[test]
fn writes_displacements_then_stresses() {
    let input = scratch("single.txt");
    let output = scratch("single.out");
    std::fs::write(&input, MODEL).unwrap();

    let out = cstfem(&[input.to_str().unwrap(), output.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let results = std::fs::read_to_string(&output).unwrap();
    let values: Vec<f64> = results.lines().map(|l| l.parse().unwrap()).collect();
    assert_eq!(values.len(), 7);
    assert_eq!(&values[..4], &[0.0, 0.0, 0.0, 0.0]);
    assert!(values[5] < 0.0);
    assert!(values[6] > 0.0);
}

#[test]
fn json_format_is_parseable() {
    let input = scratch("json.txt");
    let output = scratch("json.out");
    std::fs::write(&input, MODEL).unwrap();

    let out = cstfem(&[
        input.to_str().unwrap(),
        output.to_str().unwrap(),
        "--format",
        "json",
        "--solver",
        "cg",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let report = json::parse(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(report["nodes"].len(), 3);
    assert!(report["nodes"][2]["uy"].as_f64().unwrap() < 0.0);
    assert!(report["summary"]["max_von_mises"].as_f64().unwrap() > 0.0);
}

#[test]
fn missing_input_fails_before_creating_output() {
    let output = scratch("never.out");
    let _ = std::fs::remove_file(&output);

    let out = cstfem(&["/nonexistent/cstfem/model.txt", output.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    assert!(!output.exists());
}

#[test]
fn unwritable_output_fails() {
    let input = scratch("unwritable.txt");
    std::fs::write(&input, MODEL).unwrap();

    let out = cstfem(&[input.to_str().unwrap(), "/nonexistent/cstfem/dir/out.txt"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn malformed_input_fails() {
    let input = scratch("truncated.txt");
    let output = scratch("truncated.out");
    std::fs::write(&input, "0.3 200000 3 0 0 1").unwrap();

    let out = cstfem(&[input.to_str().unwrap(), output.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Parse error"), "{stderr}");
}

#[test]
fn failed_run_keeps_previous_results() {
    let dir = scratch("keep");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let input = dir.join("unsupported.txt");
    let output = dir.join("previous.out");
    std::fs::write(&input, MODEL.replace("2\n0 3\n1 3\n", "0\n")).unwrap();
    std::fs::write(&output, "old results\n").unwrap();

    let out = cstfem(&[input.to_str().unwrap(), output.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Solver error"), "{stderr}");

    assert_eq!(std::fs::read_to_string(&output).unwrap(), "old results\n");
    let mut left: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    left.sort();
    assert_eq!(left, vec!["previous.out", "unsupported.txt"]);
}

#[test]
fn successful_run_replaces_previous_results() {
    let input = scratch("replace.txt");
    let output = scratch("replace.out");
    std::fs::write(&input, MODEL).unwrap();
    std::fs::write(&output, "old results\n").unwrap();

    let out = cstfem(&[input.to_str().unwrap(), output.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let results = std::fs::read_to_string(&output).unwrap();
    assert_eq!(results.lines().count(), 7);
    assert!(!results.contains("old"));
}
