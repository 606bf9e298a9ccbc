mod common;

use common::TestContext;
use govm::shell::BLOCK_START;
use govm::storage::{FileStore, MetadataStore};
use govm::Version;
use std::fs;

/// Record an install of `number` under the context's root, as `govm install`
/// would leave it.
fn seed_install(ctx: &TestContext, number: &str) {
    let store = FileStore::new(&ctx.root);
    let path = store.install_path(number);
    fs::create_dir_all(path.join("bin")).unwrap();
    fs::write(path.join("bin").join("go"), "#!/bin/sh\necho go\n").unwrap();
    store
        .save_metadata(&Version {
            number: number.to_string(),
            full_name: format!("go{}", number),
            download_url: format!("https://go.dev/dl/go{}.linux-amd64.tar.gz", number),
            file_name: format!("go{}.linux-amd64.tar.gz", number),
            checksum: "00".to_string(),
            os: "linux".to_string(),
            arch: "amd64".to_string(),
            install_path: Some(path),
            ..Default::default()
        })
        .unwrap();
}

#[test]
fn test_help_and_version() {
    let ctx = TestContext::new();

    ctx.run(&["--help"])
        .assert_success()
        .assert_stdout_contains("A version manager for the Go toolchain")
        .assert_stdout_contains("Usage: govm");

    ctx.run(&["version"])
        .assert_success()
        .assert_stdout_contains(&format!("govm v{}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_config_show_formats() {
    let ctx = TestContext::new();

    ctx.run(&["config", "set", "cache-ttl-secs", "42"]).assert_success();
    ctx.run(&["config", "set", "mirror=official"]).assert_success();

    let output = ctx.run(&["config", "show", "--format", "json"]);
    output.assert_success();
    let value: serde_json::Value =
        serde_json::from_str(&output.stdout).expect("Output was not valid JSON");
    assert_eq!(value["cache_ttl_secs"], 42);
    assert_eq!(value["mirror"], "official");

    ctx.run(&["config", "show", "--format", "yaml"])
        .assert_success()
        .assert_stdout_contains("cache_ttl_secs: 42");

    ctx.run(&["config", "show", "--format", "plain"])
        .assert_success()
        .assert_stdout_contains("mirror: official");

    ctx.run(&["config", "get", "cacheTtlSecs"])
        .assert_success()
        .assert_stdout_contains("42");

    assert!(ctx.root.join("config.json").exists());
}

#[test]
fn test_config_unset_and_invalid_keys() {
    let ctx = TestContext::new();

    ctx.run(&["config", "set", "probe-timeout-secs=9"]).assert_success();
    ctx.run(&["config", "unset", "probe-timeout-secs"]).assert_success();
    ctx.run(&["config", "get", "probe_timeout_secs"])
        .assert_success()
        .assert_stdout_contains("3");

    ctx.run(&["config", "set", "shim-dir=/tmp"])
        .assert_failure()
        .assert_stderr_contains("not a valid configuration setting");
    ctx.run(&["config", "set", "mirror=moon"])
        .assert_failure()
        .assert_stderr_contains("Invalid mirror");
    ctx.run(&["config", "show", "--format", "toml"]).assert_failure();
}

#[test]
fn test_empty_root() {
    let ctx = TestContext::new();

    ctx.run(&["list"])
        .assert_success()
        .assert_stdout_contains("No Go versions installed yet.");
    ctx.run(&["current"])
        .assert_success()
        .assert_stdout_contains("No active Go version");
    ctx.run(&["use", "1.21.0"])
        .assert_failure()
        .assert_stderr_contains("go1.21.0 is not installed");
    ctx.run(&["uninstall", "go1.21.0"])
        .assert_failure()
        .assert_stderr_contains("go1.21.0 is not installed");
}

#[test]
fn test_use_list_current_uninstall() {
    let ctx = TestContext::new();
    seed_install(&ctx, "1.20.1");
    seed_install(&ctx, "1.21.0");

    ctx.run(&["use", "go1.20.1"]).assert_success();
    ctx.run(&["use", "1.21.0"])
        .assert_success()
        .assert_stdout_contains("Now using go1.21.0")
        .assert_stdout_contains("source ");

    let profile = fs::read_to_string(ctx.home.join(".bash_profile")).unwrap();
    assert_eq!(profile.matches(BLOCK_START).count(), 1);
    assert!(profile.contains("go1.21.0"));

    ctx.run(&["current"])
        .assert_success()
        .assert_stdout_contains("go1.21.0 - ");

    let list = ctx.run(&["list"]);
    list.assert_success();
    let lines: Vec<&str> = list.stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("* go1.21.0 - "));
    assert!(lines[1].starts_with("  go1.20.1 - "));

    ctx.run(&["uninstall", "1.21.0"])
        .assert_failure()
        .assert_stderr_contains("--force");
    ctx.run(&["uninstall", "1.21.0", "--force"])
        .assert_success()
        .assert_stdout_contains("go1.20.1");

    ctx.run(&["current"])
        .assert_success()
        .assert_stdout_contains("No active Go version");
    assert!(!ctx.root.join("versions").join("go1.21.0").exists());
}

#[test]
fn test_unsupported_shell() {
    let ctx = TestContext::new();
    seed_install(&ctx, "1.21.0");

    let output: common::CommandOutput = ctx
        .cmd()
        .env("SHELL", "/usr/bin/fish")
        .args(["use", "1.21.0"])
        .output()
        .expect("Failed to run govm")
        .into();
    output
        .assert_failure()
        .assert_stderr_contains("unsupported shell");
    assert!(!ctx.root.join("current").exists());
}

#[test]
fn test_uninstall_lists_remaining_like_list() {
    let ctx = TestContext::new();
    seed_install(&ctx, "1.20.1");
    seed_install(&ctx, "1.19.5");
    seed_install(&ctx, "1.21.0");
    ctx.run(&["use", "1.20.1"]).assert_success();

    let output = ctx.run(&["uninstall", "go1.19.5"]);
    output.assert_success();
    let remaining: Vec<&str> = output
        .stdout
        .lines()
        .filter(|line| line.contains(" - "))
        .collect();
    assert_eq!(remaining.len(), 2);
    assert!(remaining[0].starts_with("  go1.21.0 - "));
    assert!(remaining[1].starts_with("* go1.20.1 - "));

    let list = ctx.run(&["list"]);
    list.assert_success();
    let listed: Vec<&str> = list.stdout.lines().collect();
    assert_eq!(listed, remaining);
}
