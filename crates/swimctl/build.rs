// Exposes SWIM_VERSION to the binary for `swimctl --version`.

fn main() {
    println!("cargo:rerun-if-env-changed=SWIM_VERSION");
    println!("cargo:rerun-if-changed=Cargo.toml");

    // A SWIM_VERSION set by the packaging job wins over the crate version
    let version = match std::env::var("SWIM_VERSION") {
        Ok(v) if !v.trim().is_empty() => v,
        _ => env!("CARGO_PKG_VERSION").to_string(),
    };
    println!("cargo:rustc-env=SWIM_VERSION={}", version);
}
