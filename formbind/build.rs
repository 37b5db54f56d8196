//! Build script to capture git information at compile time

use std::env;
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/index");

    let commit_hash = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let commit_date = git(&["log", "-1", "--format=%ci"]).unwrap_or_else(|| "unknown".to_string());

    // Check if working directory is dirty
    let is_dirty = git(&["status", "--porcelain"]).is_some();
    let dirty_suffix = if is_dirty { "-dirty" } else { "" };

    println!("cargo:rustc-env=FORMBIND_GIT_HASH={}{}", commit_hash, dirty_suffix);
    println!("cargo:rustc-env=FORMBIND_GIT_DATE={}", commit_date);

    // Allow overriding the version via FORMBIND_VERSION env var (release builds)
    println!("cargo:rerun-if-env-changed=FORMBIND_VERSION");
    let version = env::var("FORMBIND_VERSION")
        .unwrap_or_else(|_| env::var("CARGO_PKG_VERSION").unwrap_or_default());
    println!("cargo:rustc-env=FORMBIND_VERSION={}", version);
}
