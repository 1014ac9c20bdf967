fn main() {
    if let Ok(target) = std::env::var("TARGET") {
        println!("cargo:rustc-env=A010_BUILD_TARGET={target}");
    }
    if let Ok(profile) = std::env::var("PROFILE") {
        println!("cargo:rustc-env=A010_BUILD_PROFILE={profile}");
    }
    println!("cargo:rerun-if-env-changed=TARGET");
}
