use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use predicates::str::contains;

fn stencil_cmd(workdir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("stencil"));
    cmd.current_dir(workdir)
        .env("HOME", workdir)
        .env("USERPROFILE", workdir)
        .env("XDG_CONFIG_HOME", workdir.join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn renders_tree_with_layered_variables() {
    let ws = TempDir::new().unwrap();
    ws.child("templates/app/config.h.j2")
        .write_str("#define NAME \"{{ app.name }}\"\n#define PORT {{ app.port }}\n")
        .unwrap();
    ws.child("vars.yml").write_str("app:\n  name: demo\n  port: 80\n").unwrap();

    stencil_cmd(ws.path())
        .args(["render", "templates", "-O", "out", "-V", "vars.yml", "-D", "app.port=8080"])
        .assert()
        .success()
        .stdout(contains("1 of 1 source(s) processed"));

    ws.child("out/app/config.h")
        .assert("#define NAME \"demo\"\n#define PORT 8080\n");
}

#[test]
fn write_then_append_doubles_child_only() {
    let ws = TempDir::new().unwrap();
    let source = ws.child("foo.c.j2");
    source
        .write_str("int x;\n{% filter write(path=\"child.txt\") %}// child\n{% endfilter %}")
        .unwrap();

    stencil_cmd(ws.path()).args(["render", "foo.c.j2"]).assert().success();
    ws.child("foo.c").assert("int x;\n");
    ws.child("child.txt").assert("// child\n");

    source
        .write_str("int x;\n{% filter append(path=\"child.txt\") %}// child\n{% endfilter %}")
        .unwrap();
    stencil_cmd(ws.path()).args(["render", "foo.c.j2"]).assert().success();
    ws.child("foo.c").assert("int x;\n");
    ws.child("child.txt").assert("// child\n// child\n");
}

#[test]
fn undefined_variable_fails_unless_relaxed() {
    let ws = TempDir::new().unwrap();
    ws.child("a.txt.j2").write_str("[{{ missing }}]").unwrap();

    stencil_cmd(ws.path())
        .args(["render", "a.txt.j2"])
        .assert()
        .failure()
        .stderr(contains("error[render]"));
    ws.child("a.txt").assert(predicate::path::missing());

    stencil_cmd(ws.path())
        .args(["render", "a.txt.j2", "--no-strict-undefined"])
        .assert()
        .success();
    ws.child("a.txt").assert("[]");
}

#[test]
fn undefined_condition_fails_unless_relaxed() {
    let ws = TempDir::new().unwrap();
    ws.child("flags.txt.j2")
        .write_str("{% if tpyo_flag %}ON{% else %}OFF{% endif %}")
        .unwrap();

    stencil_cmd(ws.path())
        .args(["render", "flags.txt.j2"])
        .assert()
        .failure()
        .stderr(contains("tpyo_flag"));
    ws.child("flags.txt").assert(predicate::path::missing());

    stencil_cmd(ws.path())
        .args(["render", "flags.txt.j2", "--no-strict-undefined"])
        .assert()
        .success();
    ws.child("flags.txt").assert("OFF");
}

#[test]
fn directory_source_requires_outdir() {
    let ws = TempDir::new().unwrap();
    ws.child("src/a.j2").write_str("a").unwrap();

    stencil_cmd(ws.path())
        .args(["render", "src"])
        .assert()
        .failure()
        .stderr(contains("requires an output directory"));
}

#[test]
fn output_flag_takes_a_single_source() {
    let ws = TempDir::new().unwrap();
    ws.child("a.j2").write_str("a").unwrap();
    ws.child("b.j2").write_str("b").unwrap();

    stencil_cmd(ws.path())
        .args(["render", "a.j2", "b.j2", "-o", "x"])
        .assert()
        .failure()
        .stderr(contains("--output takes exactly one source"));

    stencil_cmd(ws.path()).args(["render", "a.j2", "-o", "named.txt"]).assert().success();
    ws.child("named.txt").assert("a");
}

#[test]
fn conflicting_overwrite_flags_keep_existing_files() {
    let ws = TempDir::new().unwrap();
    ws.child("a.txt.j2").write_str("new").unwrap();
    ws.child("a.txt").write_str("old").unwrap();

    stencil_cmd(ws.path())
        .args(["render", "a.txt.j2", "--warn-overwrite", "--no-overwrite"])
        .assert()
        .success()
        .stderr(contains("warning[usage]"));
    ws.child("a.txt").assert("old");
}

#[test]
fn include_dirs_resolve_from_invocation_dir() {
    let ws = TempDir::new().unwrap();
    ws.child("inc/header.txt").write_str("HEADER {{ who }}").unwrap();
    ws.child("src/page.j2").write_str("{% include \"header.txt\" %}\nbody").unwrap();

    stencil_cmd(ws.path())
        .args(["render", "src/page.j2", "-I", "inc", "-D", "who=me", "-O", "out"])
        .assert()
        .success();
    ws.child("out/page").assert("HEADER me\nbody");
}

#[test]
fn config_file_supplies_defaults() {
    let ws = TempDir::new().unwrap();
    ws.child("stencil.json").write_str(r#"{"trim_whitespace": true}"#).unwrap();
    ws.child("t.j2").write_str("value   \n\n").unwrap();

    stencil_cmd(ws.path())
        .args(["render", "t.j2", "--config", "stencil.json"])
        .assert()
        .success();
    ws.child("t").assert("value");
}

#[test]
fn json_report_lists_jobs() {
    let ws = TempDir::new().unwrap();
    ws.child("src/a.j2").write_str("a").unwrap();
    ws.child("src/b.bin").write_str("b").unwrap();

    let output = stencil_cmd(ws.path())
        .args(["render", "src", "-O", "out", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let statuses: Vec<&str> = report["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|job| job["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["rendered", "skipped"]);
    assert!(fs::read_to_string(ws.path().join("out/a")).is_ok());
}

#[test]
fn copy_non_template_copies_verbatim() {
    let ws = TempDir::new().unwrap();
    ws.child("src/raw.txt").write_str("{{ not rendered }}").unwrap();

    stencil_cmd(ws.path())
        .args(["render", "src", "-O", "out", "--copy-non-template"])
        .assert()
        .success();
    ws.child("out/raw.txt").assert("{{ not rendered }}");
}
