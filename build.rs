// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=CAMERA_ENGINE_VERSION");

    // Packagers can pin the version string
    let version = match std::env::var("CAMERA_ENGINE_VERSION") {
        Ok(v) => v,
        Err(_) => git_version(),
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// `git describe` output without the `v` prefix, or the package version
/// with the short commit hash appended when no tag is reachable
fn git_version() -> String {
    let described = run_git(&["describe", "--tags", "--match", "v*"]);
    let commit = run_git(&["rev-parse", "--short", "HEAD"]);
    let package = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    match (described, commit) {
        (Some(tag), _) => tag.strip_prefix('v').unwrap_or(&tag).to_string(),
        (None, Some(hash)) => format!("{}-{}", package, hash),
        (None, None) => package,
    }
}

fn run_git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}
