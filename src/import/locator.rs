use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use super::error::{ImportError, ImportResult};

pub const DATASET_SUFFIX: &str = ".json.gz";

/// Pick the newest `*.json.gz` file directly inside `dir`.
///
/// Newest means greatest modification time; equal times fall back to the
/// lexicographically greatest file name so the choice is deterministic.
pub fn find_latest_dataset(dir: &Path) -> ImportResult<PathBuf> {
    let unreadable = |source| ImportError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut best: Option<(SystemTime, OsString)> = None;
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let name = entry.file_name();
        if !name.to_string_lossy().ends_with(DATASET_SUFFIX) {
            continue;
        }
        // Follows symlinks, so a `latest.json.gz` link counts as its target.
        let meta = match fs::metadata(entry.path()) {
            Ok(meta) => meta,
            Err(e) => {
                debug!(
                    entry = %entry.path().display(),
                    error = %e,
                    "skipping unreadable dataset entry"
                );
                continue;
            }
        };
        if meta.is_dir() {
            continue;
        }
        let modified = meta.modified().map_err(unreadable)?;

        let newer = match &best {
            None => true,
            Some((t, n)) => modified > *t || (modified == *t && name > *n),
        };
        if newer {
            best = Some((modified, name));
        }
    }

    match best {
        Some((_, name)) => Ok(dir.join(name)),
        None => Err(ImportError::NoDatasetFound {
            path: dir.to_path_buf(),
        }),
    }
}

/// Default dataset directory: `data`, else `server/data`, else `data`.
pub fn resolve_data_dir() -> PathBuf {
    for candidate in ["data", "server/data"] {
        let p = Path::new(candidate);
        if p.exists() {
            return p.to_path_buf();
        }
    }
    PathBuf::from("data")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str, modified: SystemTime) {
        let f = File::create(dir.join(name)).unwrap();
        f.set_modified(modified).unwrap();
    }

    #[test]
    fn picks_most_recent_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        touch(dir.path(), "z_old.json.gz", base);
        touch(dir.path(), "a_new.json.gz", base + Duration::from_secs(60));

        let found = find_latest_dataset(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("a_new.json.gz"));
    }

    #[test]
    fn equal_mtime_prefers_greater_name() {
        let dir = tempfile::tempdir().unwrap();
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        touch(dir.path(), "a.json.gz", t);
        touch(dir.path(), "b.json.gz", t);

        let found = find_latest_dataset(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("b.json.gz"));
    }

    #[test]
    fn ignores_other_suffixes_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        touch(dir.path(), "movies.json", t + Duration::from_secs(500));
        touch(dir.path(), "movies.gz", t + Duration::from_secs(500));
        fs::create_dir(dir.path().join("nested.json.gz")).unwrap();
        touch(dir.path(), "ids.json.gz", t);

        let found = find_latest_dataset(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("ids.json.gz"));
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_datasets_and_skips_dangling_links() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        touch(archive.path(), "movie_ids_05_01.json.gz", t + Duration::from_secs(60));
        touch(dir.path(), "movie_ids_04_30.json.gz", t);
        symlink(
            archive.path().join("movie_ids_05_01.json.gz"),
            dir.path().join("latest.json.gz"),
        )
        .unwrap();
        symlink(dir.path().join("gone.bin"), dir.path().join("zz_dangling.json.gz")).unwrap();

        let found = find_latest_dataset(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("latest.json.gz"));
    }

    #[cfg(unix)]
    #[test]
    fn keeps_non_utf8_names_intact() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let name = std::ffi::OsStr::from_bytes(b"ids_\xff.json.gz");
        let path = dir.path().join(name);
        if File::create(&path).is_err() {
            // Some filesystems refuse non-UTF-8 names.
            return;
        }

        let found = find_latest_dataset(dir.path()).unwrap();
        assert_eq!(found, path);
        assert!(found.exists());
    }

    #[test]
    fn empty_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_latest_dataset(dir.path()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn missing_directory_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_latest_dataset(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ImportError::DirectoryUnreadable { .. }));
    }
}
