// build.rs

use chrono::Utc;
use std::env;
use std::fs;
use std::path::Path;

fn main() {
    let out_dir = env::var("OUT_DIR").expect("cargo always sets OUT_DIR for build scripts");
    let dest_path = Path::new(&out_dir).join("build_info.rs");

    let build_date = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

    // bus drivers compiled into this build, dryrun is always there
    let mut drivers = Vec::new();
    if env::var_os("CARGO_FEATURE_DRIVER_LINUX").is_some() {
        drivers.push("linux");
    }
    drivers.push("dryrun");

    let info = format!(
        "pub const BUILD_DATE: &str = {:?};\npub const BUS_DRIVERS: &str = {:?};\n",
        build_date,
        drivers.join(", "),
    );
    fs::write(&dest_path, info).expect("unable to write build_info.rs");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DRIVER_LINUX");
}
