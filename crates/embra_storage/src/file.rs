//! On-disk persistence for file-backed shared groups.
//!
//! A group is stored as a single CBOR document:
//!
//! ```text
//! <path>        # { format_version, group }
//! <path>.tmp    # written, synced, then renamed over <path> on commit
//! <path>.lock   # exclusive advisory lock, held while the group is open
//! ```

use crate::error::{StorageError, StorageResult};
use crate::group::Group;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Version written into every group file.
pub(crate) const FORMAT_VERSION: u16 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u16,
    group: &'a Group,
}

#[derive(Deserialize)]
struct Envelope {
    format_version: u16,
    group: Group,
}

/// The file backing one shared group.
///
/// The lock on `<path>.lock` is taken in [`GroupFile::open`] and released
/// when the `GroupFile` is dropped, so one file has at most one writer slot.
#[derive(Debug)]
pub(crate) struct GroupFile {
    path: PathBuf,
    _lock_file: File,
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

impl GroupFile {
    /// Locks the file and loads its group, creating an empty file when
    /// missing and allowed.
    ///
    /// Fails with [`StorageError::Locked`] if another holder has the lock.
    pub(crate) fn open(path: &Path, create_if_missing: bool) -> StorageResult<(Self, Group)> {
        let exists = path.exists();
        if !exists {
            if !create_if_missing {
                return Err(StorageError::NotFound(path.to_path_buf()));
            }
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(sibling(path, ".lock"))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(path.to_path_buf()));
        }

        let file = Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        };
        let group = if exists {
            file.load()?
        } else {
            let group = Group::default();
            file.store(&group)?;
            group
        };
        Ok((file, group))
    }

    fn load(&self) -> StorageResult<Group> {
        let file = File::open(&self.path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Group::default());
        }
        decode(BufReader::new(file), &self.path)
    }

    /// Replaces the file contents with `group` using write-then-rename.
    pub(crate) fn store(&self, group: &Group) -> StorageResult<()> {
        let temp_path = sibling(&self.path, ".tmp");

        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        let envelope = EnvelopeRef {
            format_version: FORMAT_VERSION,
            group,
        };
        ciborium::into_writer(&envelope, &mut writer)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| StorageError::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        self.sync_directory()
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        File::open(parent)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StorageResult<()> {
        Ok(())
    }
}

fn decode(reader: impl std::io::Read, path: &Path) -> StorageResult<Group> {
    let envelope: Envelope = ciborium::from_reader(reader).map_err(|e| {
        StorageError::Corrupted(format!("cannot decode {}: {e}", path.display()))
    })?;
    if envelope.format_version != FORMAT_VERSION {
        return Err(StorageError::Corrupted(format!(
            "unsupported format version {} in {}, expected {FORMAT_VERSION}",
            envelope.format_version,
            path.display()
        )));
    }
    Ok(envelope.group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnType, Value};
    use tempfile::tempdir;

    #[test]
    fn missing_file_without_create_fails() {
        let temp = tempdir().unwrap();
        let result = GroupFile::open(&temp.path().join("db.embra"), false);
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert!(!temp.path().join("db.embra.lock").exists());
    }

    #[test]
    fn create_then_reload() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("db.embra");

        let (file, mut group) = GroupFile::open(&path, true).unwrap();
        assert_eq!(group, Group::default());
        assert!(path.exists());

        group.add_table("Person").unwrap();
        group.add_column("Person", "name", ColumnType::String).unwrap();
        let row = group.add_empty_row("Person").unwrap();
        group
            .set_value("Person", "name", row, Value::from("Grace"))
            .unwrap();
        file.store(&group).unwrap();
        drop(file);

        let (_file, reloaded) = GroupFile::open(&path, false).unwrap();
        assert_eq!(reloaded, group);
    }

    #[test]
    fn second_open_is_locked_until_the_first_drops() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db.embra");

        let (first, _) = GroupFile::open(&path, true).unwrap();
        assert!(matches!(
            GroupFile::open(&path, true),
            Err(StorageError::Locked(_))
        ));

        drop(first);
        assert!(GroupFile::open(&path, false).is_ok());
    }

    #[test]
    fn garbage_is_reported_as_corruption() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db.embra");
        fs::write(&path, b"definitely not cbor \xff\xff").unwrap();

        let result = GroupFile::open(&path, true);
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }

    #[test]
    fn empty_file_loads_as_empty_group() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db.embra");
        File::create(&path).unwrap();

        let (_file, group) = GroupFile::open(&path, false).unwrap();
        assert_eq!(group, Group::default());
    }
}
