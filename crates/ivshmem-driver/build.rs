// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Build script deriving `IVSHMEM_VERSION` from git.
//!
//! An explicitly set `IVSHMEM_VERSION` wins. Outside a git checkout the
//! variable stays unset and the crate reports "unknown".

fn main() {
    println!("cargo::rerun-if-env-changed=IVSHMEM_VERSION");
    if std::env::var_os("IVSHMEM_VERSION").is_some() {
        return;
    }

    let Ok(output) = std::process::Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
    else {
        return;
    };
    if !output.status.success() {
        return;
    }
    let Ok(version) = String::from_utf8(output.stdout) else {
        return;
    };
    let version = version.trim();
    if !version.is_empty() {
        println!("cargo::rustc-env=IVSHMEM_VERSION={version}");
    }
}
