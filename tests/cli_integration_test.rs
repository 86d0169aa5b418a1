#![allow(deprecated)]
mod common;

use assert_cmd::Command;
use common::create_test_file;
use indoc::indoc;
use tempfile::TempDir;

const LEAKY: &str = indoc! {r#"
    using System;
    using System.IO;

    class Leaky : IDisposable
    {
        private Stream _stream = new MemoryStream();

        public void Dispose() { }
    }
"#};

const CLEAN: &str = indoc! {r#"
    using System;
    using System.IO;

    class Clean : IDisposable
    {
        private Stream _stream = new MemoryStream();

        public void Dispose()
        {
            _stream.Dispose();
        }
    }
"#};

fn valuetrace() -> Command {
    let mut cmd = Command::cargo_bin("valuetrace").unwrap();
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn leak_fails_with_exit_code_one() {
    let dir = TempDir::new().unwrap();
    create_test_file(dir.path(), "src/Leaky.cs", LEAKY);

    let output = valuetrace().arg("analyze").arg(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Leaky._stream"), "unexpected output: {stdout}");
    assert!(stdout.contains("DisposeMember"));
}

#[test]
fn clean_sources_succeed() {
    let dir = TempDir::new().unwrap();
    create_test_file(dir.path(), "Clean.cs", CLEAN);

    valuetrace().arg("analyze").arg(dir.path()).assert().success();
}

#[test]
fn json_output_lists_members() {
    let dir = TempDir::new().unwrap();
    let file = create_test_file(dir.path(), "Leaky.cs", LEAKY);

    let output = valuetrace()
        .args(["analyze", "--format", "json"])
        .arg(&file)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let member = &value["members"][0];
    assert_eq!(member["type"], "Leaky");
    assert_eq!(member["member"], "_stream");
    assert_eq!(member["creation"], "yes");
    assert_eq!(member["finding"], "DisposeMember");
}

const HELPER: &str = indoc! {r#"
    using System;
    using System.IO;

    class Pooled : IDisposable
    {
        private Stream _stream = new MemoryStream();

        public void Dispose()
        {
            Release();
        }

        private void Release()
        {
            _stream.Dispose();
        }
    }
"#};

#[test]
fn config_file_is_honored() {
    let dir = TempDir::new().unwrap();
    create_test_file(dir.path(), "Pooled.cs", HELPER);
    valuetrace().arg("analyze").arg(dir.path()).assert().success();

    let config = create_test_file(dir.path(), "strict.toml", "follow_dispose_helpers = false\n");
    valuetrace()
        .arg("analyze")
        .arg("--config")
        .arg(&config)
        .arg(dir.path())
        .assert()
        .code(1);
}

#[test]
fn broken_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    create_test_file(dir.path(), "Clean.cs", CLEAN);
    create_test_file(dir.path(), ".valuetrace.toml", "max_depth = \"deep\"\n");

    let output = valuetrace().arg("analyze").arg(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(!stderr.is_empty());
}
