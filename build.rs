fn main() {
    // CI writes the run number into BUILD_NUMBER; local builds report 0.
    let build_number = std::env::var("TGW_BUILD_NUMBER")
        .ok()
        .or_else(|| std::fs::read_to_string("BUILD_NUMBER").ok())
        .map_or_else(|| "0".to_string(), |n| n.trim().to_string());

    println!("cargo:rustc-env=BUILD_NUMBER={build_number}");
    println!("cargo:rerun-if-changed=BUILD_NUMBER");
    println!("cargo:rerun-if-env-changed=TGW_BUILD_NUMBER");
}
