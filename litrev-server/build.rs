//! Build script for litrev-server
//!
//! Exposes build identification to the binary, logged at startup:
//! `GIT_HASH`, `BUILD_TIMESTAMP`, `BUILD_PROFILE`.

use std::process::Command;

fn git_hash() -> Option<String> {
    // Source tarballs have no .git; packagers may pass the hash explicitly
    if let Ok(hash) = std::env::var("LITREV_GIT_HASH") {
        return Some(hash);
    }

    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    let hash = git_hash().unwrap_or_else(|| "unknown".to_string());
    let build_timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", hash);
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);
    println!("cargo:rerun-if-env-changed=LITREV_GIT_HASH");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
