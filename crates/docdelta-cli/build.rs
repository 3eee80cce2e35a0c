//! Embeds the commit the binary was built from as `GIT_HASH`.
//!
//! Source tarballs have no `.git`; packagers can set `DOCDELTA_GIT_HASH`.

use std::env;
use std::process::Command;

fn commit_from_git() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string()).filter(|h| !h.is_empty())
}

fn main() {
    let hash = env::var("DOCDELTA_GIT_HASH")
        .ok()
        .or_else(commit_from_git)
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=GIT_HASH={}", hash);

    println!("cargo:rerun-if-env-changed=DOCDELTA_GIT_HASH");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
}
