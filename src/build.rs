// Put data in the binary at compile time.
// The version is logged at startup, e.g.:
// VERSION=1.0.0-rc20251015 cargo build

fn main() {
    let version = std::env::var("VERSION").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rerun-if-changed=src/build.rs");
    println!("cargo:rerun-if-env-changed=VERSION");
    println!("cargo:rustc-env=version={}", version);
}
