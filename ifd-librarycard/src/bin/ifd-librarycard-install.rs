//! Installer for the ifd-librarycard IFD handler
//!
//! Copies the handler into a pcscd driver bundle and registers the virtual
//! reader so pcscd loads it on start.
//!
//! Usage: sudo ifd-librarycard-install [path/to/libifd_librarycard.so]

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use thiserror::Error;

const LIBRARY_NAME: &str = "libifd_librarycard.so";
const BUNDLE_DIR: &str = "/usr/lib/pcsc/drivers/ifd-librarycard.bundle";
const CONF_DIR: &str = "/etc/reader.conf.d";
const CONF_NAME: &str = "librarycard";

#[derive(Debug, Error)]
enum InstallError {
    #[error("this installer must be run as root (use sudo)")]
    NotRoot,

    #[error("could not find libifd_librarycard.so; build it first with: cargo build --release")]
    LibraryNotFound,

    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },
}

fn io_step<T>(action: &'static str, path: &Path, result: io::Result<T>) -> Result<T, InstallError> {
    result.map_err(|source| InstallError::Io {
        action,
        path: path.display().to_string(),
        source,
    })
}

fn info_plist() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleDevelopmentRegion</key>
    <string>English</string>
    <key>CFBundleExecutable</key>
    <string>{LIBRARY_NAME}</string>
    <key>CFBundleIdentifier</key>
    <string>org.librarycard.ifd-handler</string>
    <key>CFBundleInfoDictionaryVersion</key>
    <string>6.0</string>
    <key>CFBundleName</key>
    <string>ifd-librarycard</string>
    <key>CFBundlePackageType</key>
    <string>BNDL</string>
    <key>CFBundleShortVersionString</key>
    <string>{version}</string>
    <key>CFBundleSignature</key>
    <string>????</string>
    <key>CFBundleVersion</key>
    <string>{version}</string>
    <key>ifdCapabilities</key>
    <string>0x00000000</string>
    <key>ifdProtocolSupport</key>
    <string>0x00000002</string>
    <key>ifdVersionNumber</key>
    <string>0x00000001</string>
    <key>ifdManufacturerString</key>
    <string>librarycard</string>
    <key>ifdProductString</key>
    <string>Library Card Virtual Reader</string>
    <key>ifdSerialNumber</key>
    <string>0</string>
    <key>ifdLogLevel</key>
    <string>0x0003</string>
</dict>
</plist>
"#
    )
}

fn reader_conf(lib_path: &Path) -> String {
    format!(
        r#"# Virtual library membership card reader
FRIENDLYNAME      "Library Card Virtual Reader"
DEVICENAME        /dev/null
LIBPATH           {}
CHANNELID         0x00000001
"#,
        lib_path.display()
    )
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), InstallError> {
    if !is_root() {
        return Err(InstallError::NotRoot);
    }

    println!("Installing ifd-librarycard IFD handler...");

    let lib_path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .filter(|p| p.exists())
        .or_else(find_library)
        .ok_or(InstallError::LibraryNotFound)?;
    println!("Found library at: {}", lib_path.display());

    let bundle_contents = Path::new(BUNDLE_DIR).join("Contents");
    let bundle_linux = bundle_contents.join("Linux");
    io_step("creating", &bundle_linux, fs::create_dir_all(&bundle_linux))?;

    let plist_path = bundle_contents.join("Info.plist");
    io_step("writing", &plist_path, fs::write(&plist_path, info_plist()))?;
    println!("Wrote {}", plist_path.display());

    let dest_lib = bundle_linux.join(LIBRARY_NAME);
    io_step("copying library to", &dest_lib, fs::copy(&lib_path, &dest_lib))?;
    println!("Copied library to: {}", dest_lib.display());

    let conf_dir = Path::new(CONF_DIR);
    io_step("creating", conf_dir, fs::create_dir_all(conf_dir))?;
    let conf_path = conf_dir.join(CONF_NAME);
    io_step("writing", &conf_path, fs::write(&conf_path, reader_conf(&dest_lib)))?;
    println!("Wrote reader configuration: {}", conf_path.display());

    println!();
    println!("IFD handler installed successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Restart pcscd: sudo systemctl restart pcscd");
    println!("  2. Verify with: pcsc_scan");
    println!("Card state is kept in ~/.librarycard of the pcscd user unless LIBRARYCARD_STORAGE_DIR is set.");
    Ok(())
}

fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

fn find_library() -> Option<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("target/release").join(LIBRARY_NAME),
        PathBuf::from("../target/release").join(LIBRARY_NAME),
        PathBuf::from("/usr/local/lib").join(LIBRARY_NAME),
        PathBuf::from("/usr/lib").join(LIBRARY_NAME),
    ];
    if let Ok(ld_path) = env::var("LD_LIBRARY_PATH") {
        candidates.extend(ld_path.split(':').map(|dir| Path::new(dir).join(LIBRARY_NAME)));
    }

    candidates.into_iter().find(|path| path.exists())
}
