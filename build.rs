use std::{env, path::Path};

const DISCOVERY_VARS: [&str; 4] = ["FFMPEG_DIR", "PKG_CONFIG_PATH", "VCPKG_ROOT", "VCPKGRS_TRIPLET"];

fn main() {
    for var in DISCOVERY_VARS {
        println!("cargo:rerun-if-env-changed={var}");
    }

    // ffmpeg-sys-next does the actual linking; this only points at common
    // misconfigurations before its own error message does.
    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    match target_os.as_str() {
        "windows" => hint_vcpkg(),
        "macos" if env::var_os("PKG_CONFIG_PATH").is_none() => println!(
            "cargo:warning=framepipe: if FFmpeg is not found, install it with Homebrew and make sure pkg-config can see it"
        ),
        _ => {}
    }
}

fn hint_vcpkg() {
    let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
        println!(
            "cargo:warning=framepipe: set FFMPEG_DIR (or VCPKG_ROOT) so the FFmpeg libraries can be found on Windows"
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let install = Path::new(&vcpkg_root).join("installed").join(&triplet);
    if install.join("include").join("libavcodec").is_dir() {
        println!(
            "cargo:warning=framepipe: found FFmpeg under {}; set FFMPEG_DIR to it to skip discovery",
            install.display()
        );
    } else {
        println!(
            "cargo:warning=framepipe: VCPKG_ROOT is set but {} has no FFmpeg headers (vcpkg install ffmpeg:{triplet})",
            install.display()
        );
    }
}
