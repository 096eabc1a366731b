use std::process::Command;

fn main() {
    // BUILD_VERSION = git short hash, or the crate version outside a checkout.
    let hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .unwrap_or_default();

    let version = match hash.trim() {
        "" => env!("CARGO_PKG_VERSION").to_string(),
        hash => format!("{}-{}", env!("CARGO_PKG_VERSION"), hash),
    };
    println!("cargo:rustc-env=BUILD_VERSION={version}");
    println!("cargo:rerun-if-changed=src/");
}
