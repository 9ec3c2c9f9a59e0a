use std::env;
use std::path::{Path, PathBuf};

const WATCHED_VARIABLES: &[&str] = &["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_TRIPLET"];

fn main() {
    for variable in WATCHED_VARIABLES {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    // pkg-config finds FFmpeg everywhere except Windows.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }
    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    match vcpkg_ffmpeg_dir() {
        Some(dir) if has_xvid_import_library(&dir) => println!(
            "cargo:warning=Found FFmpeg with libxvid under {}; export FFMPEG_DIR to use it.",
            dir.display()
        ),
        Some(dir) => println!(
            "cargo:warning=Found FFmpeg under {} but no xvidcore library; scxvid will fall back to the mpeg4 encoder.",
            dir.display()
        ),
        None => println!(
            "cargo:warning=FFMPEG_DIR is not set. Install ffmpeg[xvid] with vcpkg and point FFMPEG_DIR at it."
        ),
    }
}

fn vcpkg_ffmpeg_dir() -> Option<PathBuf> {
    let root = env::var_os("VCPKG_ROOT")?;
    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let dir = Path::new(&root).join("installed").join(triplet);
    dir.join("include").join("libavcodec").is_dir().then_some(dir)
}

fn has_xvid_import_library(dir: &Path) -> bool {
    ["xvidcore.lib", "libxvidcore.lib"]
        .iter()
        .any(|name| dir.join("lib").join(name).is_file())
}
