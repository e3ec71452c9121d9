//! Sync packets: point-in-time copies of the data directories, packaged as `.tgz`.
//!
//! A packet has exactly two top-level entries, `database/` and `filedir/`.
//! Archive entries are relative to the snapshot root, so the root itself
//! never appears as a path prefix.
//!
//! Everything here is blocking filesystem work; async callers run it on
//! `tokio::task::spawn_blocking`.

pub mod fs;

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};

use crate::errors::{SyncError, SyncResult};

pub use self::fs::{copy_tree, replace_tree};

/// Canonical top-level entries inside a packet.
pub mod paths {
    /// Snapshot of the relational store's data directory.
    pub const DATABASE: &str = "database";
    /// Snapshot of the bulk file store.
    pub const FILEDIR: &str = "filedir";
}

/// Prefix for every temporary path the builder creates.
const TMP_PREFIX: &str = "syncer-";

/// One tree to capture: where it lives and its name inside the packet.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    pub source: PathBuf,
    pub name: String,
}

impl SnapshotSource {
    pub fn new(source: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PacketBuilder {
    work_dir: PathBuf,
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl PacketBuilder {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// A fresh, collision-resistant path under the work directory.
    pub fn fresh_path(&self, suffix: &str) -> PathBuf {
        self.work_dir
            .join(format!("{}{}{}", TMP_PREFIX, uuid::Uuid::new_v4(), suffix))
    }

    /// Copy every source tree into a new temporary root under its packet name.
    ///
    /// Copies are not transactional. The producer must already be stopped so
    /// the source trees are stable; a partial copy may remain after a failure.
    pub fn snapshot(&self, sources: &[SnapshotSource]) -> SyncResult<PathBuf> {
        let root = self.fresh_path("");
        std::fs::create_dir_all(&root)
            .map_err(|e| SyncError::io(format!("creating {}", root.display()), e))?;

        for src in sources {
            let dest = root.join(&src.name);
            let files = copy_tree(&src.source, &dest).map_err(|e| {
                SyncError::io(
                    format!("copying {} into packet as {}", src.source.display(), src.name),
                    e,
                )
            })?;
            tracing::debug!(source = %src.source.display(), name = %src.name, files, "snapshot copied");
        }

        Ok(root)
    }

    /// Write `<root>.tgz` holding the root's children as top-level entries.
    pub fn package(&self, root: &Path) -> SyncResult<PathBuf> {
        let archive = root.with_extension("tgz");
        let ctx = || format!("packaging {}", root.display());

        let file = File::create(&archive).map_err(|e| SyncError::io(ctx(), e))?;
        let gz = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut tar = Builder::new(gz);
        tar.follow_symlinks(false);

        let mut children: Vec<_> = std::fs::read_dir(root)
            .and_then(|rd| rd.collect::<io::Result<Vec<_>>>())
            .map_err(|e| SyncError::io(ctx(), e))?;
        children.sort_by_key(|entry| entry.file_name());

        for child in children {
            let name = child.file_name();
            let path = child.path();
            let is_dir = child
                .file_type()
                .map_err(|e| SyncError::io(ctx(), e))?
                .is_dir();
            let appended = if is_dir {
                tar.append_dir_all(&name, &path)
            } else {
                tar.append_path_with_name(&path, &name)
            };
            appended.map_err(|e| SyncError::io(ctx(), e))?;
        }

        let gz = tar.into_inner().map_err(|e| SyncError::io(ctx(), e))?;
        let mut out = gz.finish().map_err(|e| SyncError::io(ctx(), e))?;
        io::Write::flush(&mut out).map_err(|e| SyncError::io(ctx(), e))?;

        Ok(archive)
    }

    /// Inverse of [`package`](Self::package): extract next to the archive.
    ///
    /// `<dir>/import.tgz` unpacks into `<dir>/import/`.
    pub fn unpack(&self, archive: &Path) -> SyncResult<PathBuf> {
        let dest = archive.with_extension("");
        let ctx = || format!("unpacking {}", archive.display());

        let file = File::open(archive).map_err(|e| SyncError::io(ctx(), e))?;
        std::fs::create_dir_all(&dest).map_err(|e| SyncError::io(ctx(), e))?;

        let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));
        tar.set_preserve_permissions(true);
        tar.set_overwrite(true);
        // `unpack` refuses entries that would escape `dest`.
        tar.unpack(&dest).map_err(|e| SyncError::io(ctx(), e))?;

        Ok(dest)
    }

    /// Best-effort recursive removal. Never fails the caller.
    pub fn cleanup(&self, path: &Path) {
        let result = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        match result {
            Ok(()) => tracing::debug!(path = %path.display(), "temporary data removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary data")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;
    use walkdir::WalkDir;

    fn tree(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
        WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|e| e.unwrap())
            .map(|e| {
                let rel = e
                    .path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                let data = e.file_type().is_file().then(|| std::fs::read(e.path()).unwrap());
                (rel, data)
            })
            .collect()
    }

    fn seed(dir: &Path) -> (PathBuf, PathBuf) {
        let db = dir.join("pgdata");
        std::fs::create_dir_all(db.join("base/16384")).unwrap();
        std::fs::create_dir_all(db.join("pg_wal/archive_status")).unwrap();
        std::fs::write(db.join("PG_VERSION"), b"13\n").unwrap();
        std::fs::write(db.join("base/16384/1259"), vec![7u8; 8192]).unwrap();
        std::fs::write(db.join("postmaster.opts"), b"").unwrap();

        let files = dir.join("moodledata/filedir");
        std::fs::create_dir_all(files.join("ab/cd")).unwrap();
        std::fs::write(files.join("ab/cd/abcd1234"), b"file content").unwrap();
        std::fs::write(files.join("empty"), b"").unwrap();
        (db, files)
    }

    #[test]
    fn package_then_unpack_reproduces_trees() {
        let dir = tempdir().unwrap();
        let (db, files) = seed(dir.path());
        let work = dir.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        let builder = PacketBuilder::new(&work);

        let root = builder
            .snapshot(&[
                SnapshotSource::new(&db, paths::DATABASE),
                SnapshotSource::new(&files, paths::FILEDIR),
            ])
            .unwrap();
        let archive = builder.package(&root).unwrap();
        builder.cleanup(&root);
        assert!(!root.exists());
        assert_eq!(archive.extension().unwrap(), "tgz");

        let import_dir = dir.path().join("import");
        std::fs::create_dir_all(&import_dir).unwrap();
        let moved = import_dir.join("import.tgz");
        std::fs::rename(&archive, &moved).unwrap();

        let data = builder.unpack(&moved).unwrap();
        assert_eq!(data, import_dir.join("import"));
        assert_eq!(tree(&data.join(paths::DATABASE)), tree(&db));
        assert_eq!(tree(&data.join(paths::FILEDIR)), tree(&files));
    }

    #[test]
    fn archive_entries_have_no_root_prefix() {
        let dir = tempdir().unwrap();
        let (db, files) = seed(dir.path());
        let builder = PacketBuilder::new(dir.path());

        let root = builder
            .snapshot(&[
                SnapshotSource::new(&db, paths::DATABASE),
                SnapshotSource::new(&files, paths::FILEDIR),
            ])
            .unwrap();
        let archive = builder.package(&root).unwrap();

        let mut tar = Archive::new(GzDecoder::new(File::open(&archive).unwrap()));
        let mut tops: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| {
                let e = e.unwrap();
                let path = e.path().unwrap().into_owned();
                path.components()
                    .next()
                    .unwrap()
                    .as_os_str()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        tops.sort();
        tops.dedup();
        assert_eq!(tops, vec!["database", "filedir"]);
    }

    #[test]
    fn snapshot_missing_source_is_io_error() {
        let dir = tempdir().unwrap();
        let builder = PacketBuilder::new(dir.path());
        let err = builder
            .snapshot(&[SnapshotSource::new(dir.path().join("nope"), paths::DATABASE)])
            .unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }

    #[test]
    fn unpack_corrupt_archive_is_io_error() {
        let dir = tempdir().unwrap();
        let bogus = dir.path().join("bogus.tgz");
        std::fs::write(&bogus, b"definitely not gzip").unwrap();

        let err = PacketBuilder::new(dir.path()).unpack(&bogus).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }

    #[test]
    fn cleanup_missing_path_is_silent() {
        let dir = tempdir().unwrap();
        PacketBuilder::new(dir.path()).cleanup(&dir.path().join("gone"));
    }

    #[test]
    fn fresh_paths_do_not_collide() {
        let builder = PacketBuilder::new("/tmp");
        assert_ne!(builder.fresh_path(""), builder.fresh_path(""));
    }
}
