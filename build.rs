use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Version comes from TENDIES_VERSION, then a VERSION file next to Cargo.toml
    let version = if let Ok(v) = env::var("TENDIES_VERSION") {
        v
    } else {
        let version_file = Path::new("VERSION");
        if version_file.exists() {
            fs::read_to_string(version_file)
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string())
                .trim()
                .to_string()
        } else {
            env!("CARGO_PKG_VERSION").to_string()
        }
    };

    println!("cargo:rustc-env=TENDIES_VERSION={}", version);
    println!("cargo:rerun-if-changed=VERSION");
    println!("cargo:rerun-if-env-changed=TENDIES_VERSION");
}
