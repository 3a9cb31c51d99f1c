//! Stamps `cspmac version --extended` with the build target, profile and
//! commit.

use std::process::Command;

fn main() {
    for (var, key) in [("TARGET", "CSPMAC_BUILD_TARGET"), ("PROFILE", "CSPMAC_BUILD_PROFILE")] {
        if let Ok(value) = std::env::var(var) {
            println!("cargo:rustc-env={key}={value}");
        }
        println!("cargo:rerun-if-env-changed={var}");
    }

    // Release pipelines pass GIT_HASH in; local builds ask git.
    println!("cargo:rerun-if-env-changed=GIT_HASH");
    if std::env::var_os("GIT_HASH").is_none() {
        if let Some(hash) = git_short_hash() {
            println!("cargo:rustc-env=GIT_HASH={hash}");
        }
    }
}

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}
