//! End-to-end variable loading: files on disk through the merge engine.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use rstest::rstest;

use stencil_core::{
    merge, Capabilities, DiagnosticKind, Diagnostics, Format, FormatOptions, IdentifierPolicy,
    Mapping, MergeRequest, Value, VarFile,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn var_file(dir: &TempDir, name: &str, content: &str) -> VarFile {
    let child = dir.child(name);
    child.write_str(content).unwrap();
    child.path().display().to_string().parse().unwrap()
}

fn lookup<'a>(vars: &'a Mapping, dotted: &str) -> &'a Value {
    let mut parts = dotted.split('.');
    let mut current = &vars[parts.next().unwrap()];
    for part in parts {
        current = &current.as_mapping().unwrap()[part];
    }
    current
}

fn merge_files(files: Vec<VarFile>, defines: &[&str]) -> (Mapping, Diagnostics) {
    let request = MergeRequest {
        files,
        defines: defines.iter().map(|d| d.to_string()).collect(),
        ..Default::default()
    };
    let mut diags = Diagnostics::new();
    let result = merge(request, &Capabilities::new(), &mut diags);
    (result.into_inner(), diags)
}

// ---------------------------------------------------------------------------
// Precedence
// ---------------------------------------------------------------------------

#[test]
fn later_files_and_defines_win_at_every_depth() {
    let dir = TempDir::new().unwrap();
    let a = var_file(&dir, "a.yml", "x: 1\nnested:\n  y: 1\n  z: 1\n");
    let b = var_file(&dir, "b.json", r#"{"x": 2, "nested": {"y": 2}}"#);

    let (vars, diags) = merge_files(vec![a, b], &["nested.z=3"]);
    assert!(diags.is_empty());
    assert_eq!(vars["x"], Value::Int(2));
    assert_eq!(*lookup(&vars, "nested.y"), Value::Int(2));
    assert_eq!(*lookup(&vars, "nested.z"), Value::Int(3));
}

#[test]
fn files_beat_the_environment_at_every_depth() {
    let dir = TempDir::new().unwrap();
    let file = var_file(&dir, "site.json", r#"{"a": {"x": 2}}"#);

    let mut inner = Mapping::new();
    inner.insert("x".into(), Value::Int(1));
    inner.insert("y".into(), Value::Int(1));
    let mut environment = Mapping::new();
    environment.insert("a".into(), Value::Mapping(inner));

    let request = MergeRequest {
        environment: Some(environment),
        files: vec![file],
        ..Default::default()
    };
    let mut diags = Diagnostics::new();
    let vars = merge(request, &Capabilities::new(), &mut diags).into_inner();

    assert!(diags.is_empty());
    assert_eq!(*lookup(&vars, "a.x"), Value::Int(2));
    assert_eq!(*lookup(&vars, "a.y"), Value::Int(1));
}

#[test]
fn deep_merge_across_formats() {
    let dir = TempDir::new().unwrap();
    let a = var_file(&dir, "a.toml", "[a]\nb = 1\n");
    let b = var_file(&dir, "b.ini", "[a]\nc = 2\n");

    let (vars, _) = merge_files(vec![a, b], &[]);
    let a = vars["a"].as_mapping().unwrap();
    assert_eq!(a["b"], Value::Int(1));
    assert_eq!(a["c"], Value::Int(2));
}

#[test]
fn dotted_define_merges_into_file_mapping() {
    let dir = TempDir::new().unwrap();
    let a = var_file(&dir, "a.yml", "a:\n  b:\n    keep: true\n");

    let (vars, _) = merge_files(vec![a], &["a.b.c=v"]);
    assert_eq!(*lookup(&vars, "a.b.c"), Value::from("v"));
    assert_eq!(*lookup(&vars, "a.b.keep"), Value::Bool(true));
}

#[test]
fn broken_file_is_skipped_and_reported() {
    let dir = TempDir::new().unwrap();
    let good = var_file(&dir, "good.yml", "ok: 1\n");
    let bad = var_file(&dir, "bad.json", "{ nope");

    let (vars, diags) = merge_files(vec![good, bad], &[]);
    assert_eq!(vars["ok"], Value::Int(1));
    assert_eq!(diags.errors().count(), 1);
    assert!(diags.errors().next().unwrap().to_string().contains("bad.json"));
}

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

#[test]
fn csv_rows_keyed_by_first_column() {
    let dir = TempDir::new().unwrap();
    let table = var_file(&dir, "table.csv", "name,cost,pop\nalice,10,3\nbob,20,4\n");

    let (vars, _) = merge_files(vec![table], &[]);
    assert_eq!(*lookup(&vars, "alice.cost"), Value::Int(10));
    assert_eq!(*lookup(&vars, "alice.pop"), Value::Int(3));
    assert_eq!(*lookup(&vars, "bob.cost"), Value::Int(20));
    assert_eq!(*lookup(&vars, "bob.pop"), Value::Int(4));
}

#[test]
fn xml_with_underscore_root() {
    let dir = TempDir::new().unwrap();
    let xml = var_file(&dir, "vars.xml", "<_><port>80</port><host>web</host></_>");

    let (vars, _) = merge_files(vec![xml], &[]);
    assert_eq!(vars["port"], Value::Int(80));
    assert_eq!(vars["host"], Value::from("web"));
}

#[test]
fn explicit_format_suffix() {
    let dir = TempDir::new().unwrap();
    dir.child("vars.txt").write_str("k: v\n").unwrap();
    let spec = format!("{}:yaml", dir.child("vars.txt").path().display());
    let file: VarFile = spec.parse().unwrap();
    assert_eq!(file.format, Format::Yaml);

    let (vars, _) = merge_files(vec![file], &[]);
    assert_eq!(vars["k"], Value::from("v"));
}

// ---------------------------------------------------------------------------
// Identifier policies
// ---------------------------------------------------------------------------

#[rstest]
#[case(IdentifierPolicy::Strict, None, 1)]
#[case(IdentifierPolicy::Permissive, Some("2-bad key"), 0)]
#[case(IdentifierPolicy::Fix, Some("_2_bad_key"), 0)]
fn identifier_policy_applies_to_files(
    #[case] policy: IdentifierPolicy,
    #[case] expected_key: Option<&str>,
    #[case] warnings: usize,
) {
    let dir = TempDir::new().unwrap();
    let file = var_file(&dir, "vars.json", r#"{"2-bad key": 1, "good": 2}"#);

    let request = MergeRequest {
        files: vec![file],
        options: FormatOptions { identifiers: policy, ..Default::default() },
        ..Default::default()
    };
    let mut diags = Diagnostics::new();
    let vars = merge(request, &Capabilities::new(), &mut diags).into_inner();

    assert_eq!(vars["good"], Value::Int(2));
    match expected_key {
        Some(key) => assert_eq!(vars[key], Value::Int(1)),
        None => assert_eq!(vars.len(), 1),
    }
    assert_eq!(diags.warnings().count(), warnings);
}

#[test]
fn file_adapter_output_is_sanitised_again() {
    let dir = TempDir::new().unwrap();
    let file = var_file(&dir, "vars.yml", "a: 1\n");

    let mut caps = Capabilities::new();
    caps.set_file_adapter(|vars: &mut Mapping| -> Result<(), stencil_core::HookError> {
        vars.insert("bad key".into(), Value::Int(9));
        vars.insert("added".into(), Value::Int(2));
        Ok(())
    });
    let request = MergeRequest { files: vec![file], ..Default::default() };
    let mut diags = Diagnostics::new();
    let vars = merge(request, &caps, &mut diags).into_inner();

    assert_eq!(vars["a"], Value::Int(1));
    assert_eq!(vars["added"], Value::Int(2));
    assert!(!vars.contains_key("bad key"));
    assert_eq!(diags.warnings().count(), 1);
}

#[test]
fn failing_file_adapter_keeps_the_file_variables() {
    let dir = TempDir::new().unwrap();
    let first = var_file(&dir, "first.yml", "a: 1\nshared: first\n");
    let second = var_file(&dir, "second.yml", "b: 2\nshared: second\n");

    let mut caps = Capabilities::new();
    caps.set_file_adapter(|vars: &mut Mapping| -> Result<(), stencil_core::HookError> {
        vars.clear();
        Err(stencil_core::HookError::Message("adapter crashed".into()))
    });
    let request = MergeRequest { files: vec![first, second], ..Default::default() };
    let mut diags = Diagnostics::new();
    let vars = merge(request, &caps, &mut diags).into_inner();

    assert_eq!(vars["a"], Value::Int(1));
    assert_eq!(vars["b"], Value::Int(2));
    assert_eq!(vars["shared"], Value::from("second"));
    let hook_errors = diags.iter().filter(|d| d.kind == DiagnosticKind::Hook).count();
    assert_eq!(hook_errors, 2);
}
