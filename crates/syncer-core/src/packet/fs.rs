//! Recursive tree copy used for snapshots and for replacing replica data.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Copy `src` into `dst` recursively, overwriting files that already exist.
///
/// Directory permissions are carried over (PostgreSQL refuses a data
/// directory with group/world access). Symlinks are recreated, not followed.
/// Not transactional: a failure leaves a partial copy behind.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<u64> {
    let meta = fs::metadata(src)?;
    if !meta.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a directory: {}", src.display()),
        ));
    }

    let mut files = 0u64;
    // Contents first, so a read-only directory mode is applied after its children exist.
    for entry in WalkDir::new(src).follow_links(false).contents_first(true) {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            let perms = entry.metadata().map_err(io::Error::from)?.permissions();
            fs::set_permissions(&target, perms)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }
    Ok(files)
}

/// Delete `dst` wholesale, then copy `src` into its place.
pub fn replace_tree(src: &Path, dst: &Path) -> io::Result<u64> {
    match fs::remove_dir_all(dst) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    copy_tree(src, dst)
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let pointee = fs::read_link(link)?;
    if fs::symlink_metadata(target).is_ok() {
        fs::remove_file(target)?;
    }
    std::os::unix::fs::symlink(pointee, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    fs::copy(link, target).map(|_| ())
}
