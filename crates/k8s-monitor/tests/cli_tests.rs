//! CLI integration tests

use std::process::{Command, Output};

/// Run the binary with a clean monitor environment
fn run_monitor(args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_k8s-monitor"));
    command
        .args(args)
        .env_remove("K8S_MONITOR_POD")
        .env_remove("K8S_MONITOR_NAMESPACE")
        .env_remove("K8S_MONITOR_INTERVAL_SECS")
        .env_remove("K8S_MONITOR_REQUEST_TIMEOUT_SECS")
        .env_remove("K8S_MONITOR_UNHEALTHY_AFTER")
        .env_remove("K8S_MONITOR_LISTEN_PORT")
        .env_remove("KUBECONFIG");
    for (key, value) in envs {
        command.env(key, value);
    }
    command.output().expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run_monitor(&["--help"], &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Monitor the CPU and memory usage of a Kubernetes Pod"),
        "Should show description"
    );
    assert!(stdout.contains("--pod"), "Should show pod option");
    assert!(stdout.contains("--namespace"), "Should show namespace option");
    assert!(stdout.contains("--kubeconfig"), "Should show kubeconfig option");
    assert!(stdout.contains("--once"), "Should show once option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run_monitor(&["--version"], &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("k8s-monitor"), "Should show binary name");
}

/// Missing pod name is a startup error
#[test]
fn test_missing_pod_fails() {
    let output = run_monitor(&[], &[]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Missing --pod should fail");
    assert!(stderr.contains("--pod"), "Should name the missing flag");
}

/// Unreadable kubeconfig stops the process before monitoring starts
#[test]
fn test_missing_kubeconfig_fails() {
    let output = run_monitor(
        &[
            "--pod",
            "web-1",
            "--kubeconfig",
            "/nonexistent/k8s-monitor/kubeconfig",
        ],
        &[],
    );
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Bad kubeconfig should fail");
    assert!(
        stderr.contains("kubeconfig"),
        "Should explain the kubeconfig failure: {stderr}"
    );
}

/// Invalid tuning settings are rejected at startup
#[test]
fn test_zero_interval_fails() {
    let output = run_monitor(&["--pod", "web-1"], &[("K8S_MONITOR_INTERVAL_SECS", "0")]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Zero interval should fail");
    assert!(stderr.contains("INTERVAL_SECS"), "Should name the setting: {stderr}");
}

/// Unknown log format is rejected by argument parsing
#[test]
fn test_invalid_log_format_fails() {
    let output = run_monitor(&["--pod", "web-1", "--log-format", "xml"], &[]);

    assert!(!output.status.success(), "Unknown log format should fail");
}
