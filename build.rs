//! Emits hints when FFmpeg is unlikely to be found by `ffmpeg-sys-next`.
//!
//! No linking is done here; `ffmpeg-sys-next` owns discovery.

use std::{env, path::PathBuf};

fn warn(message: &str) {
    println!("cargo:warning={message}");
}

fn main() {
    for variable in ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_TRIPLET", "PKG_CONFIG_PATH"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }

    let Some(vcpkg_root) = env::var_os("VCPKG_ROOT") else {
        warn("framebatch: neither FFMPEG_DIR nor VCPKG_ROOT is set; FFmpeg may not be found");
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let install = PathBuf::from(vcpkg_root).join("installed").join(triplet);
    if install.join("include").join("libavcodec").exists() {
        warn(&format!(
            "framebatch: using vcpkg FFmpeg at {}; set FFMPEG_DIR to pin it",
            install.display()
        ));
    } else {
        warn(&format!(
            "framebatch: no FFmpeg headers under {}; run `vcpkg install ffmpeg`",
            install.display()
        ));
    }
}
