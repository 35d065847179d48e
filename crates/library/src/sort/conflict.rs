use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Highest ` (n)` suffix tried before giving up on finding a free name.
const MAX_SUFFIX: u32 = 999;

/// Where an incoming file should end up.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Destination {
    /// Nothing occupies this path yet.
    Free(PathBuf),
    /// A file with identical contents is already here.
    Duplicate(PathBuf),
}

/// Finds a destination for `source` inside `dir`.
///
/// The file keeps its name when that slot is free. An occupant with the same
/// bytes means there is nothing left to do. Otherwise ` (1)`, ` (2)`, ...
/// is inserted before the extension until a free or identical slot turns up.
pub(crate) fn resolve(dir: &Path, source: &Path) -> io::Result<Destination> {
    let file_name = source
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"))?;
    for n in 0..=MAX_SUFFIX {
        let candidate = match n {
            0 => dir.join(file_name),
            n => dir.join(suffixed(file_name, n)),
        };
        if fs::symlink_metadata(&candidate).is_err() {
            return Ok(Destination::Free(candidate));
        }
        if same_contents(source, &candidate)? {
            return Ok(Destination::Duplicate(candidate));
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name left in {}", dir.display()),
    ))
}

/// `Game (USA).gba` becomes `Game (USA) (2).gba`.
fn suffixed(file_name: &OsStr, n: u32) -> String {
    let path = Path::new(file_name);
    let stem = path.file_stem().unwrap_or(file_name).to_string_lossy();
    match path.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    }
}

fn same_contents(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(fs::read(a)? == fs::read(b)?)
}
