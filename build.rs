use std::env;
use std::process::Command;

fn main() {
    // Exposed as application_info on /metrics so operators can tell which build is serving
    if env::var("RUSTC_VERSION").is_err() {
        let version = Command::new("rustc")
            .arg("--version")
            .output()
            .ok()
            .and_then(|output| String::from_utf8(output.stdout).ok())
            .and_then(|text| text.split_whitespace().nth(1).map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        println!("cargo:rustc-env=RUSTC_VERSION={}", version);
    }

    if env::var("BUILD_TIMESTAMP").is_err() {
        let timestamp = chrono::Utc::now().to_rfc3339();
        println!("cargo:rustc-env=BUILD_TIMESTAMP={}", timestamp);
    }

    println!("cargo:rerun-if-env-changed=RUSTC_VERSION");
    println!("cargo:rerun-if-env-changed=BUILD_TIMESTAMP");
}
