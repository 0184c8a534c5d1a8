use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static REPLACE_COUNTER: AtomicU64 = AtomicU64::new(0);
pub(crate) const TEMP_PREFIX: &str = ".skipmark.tmp.";

/// Overwrites an existing file in full. The new bytes land in a sibling temp
/// file first and are renamed over the target, keeping its permissions.
/// Symlinks are followed so the link itself survives.
pub fn replace_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let resolved = fs::canonicalize(path)?;
    let path = resolved.as_path();
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path `{}` has no parent directory", path.display()),
        )
    })?;
    let permissions = fs::metadata(path)?.permissions();

    let tmp_path = temp_path_in_parent(parent, path)?;
    let mut tmp_file = create_temp_file(&tmp_path)?;

    let write_result = (|| -> io::Result<()> {
        tmp_file.write_all(bytes)?;
        tmp_file.flush()?;
        tmp_file.set_permissions(permissions)?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        rename_overwrite(&tmp_path, path)?;
        sync_parent_dir(parent)?;
        Ok(())
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    write_result
}

fn create_temp_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create_new(true).write(true).open(path)
}

fn rename_overwrite(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) => {
            if to.exists() {
                fs::remove_file(to)?;
                fs::rename(from, to)
            } else {
                Err(err)
            }
        }
    }
}

#[cfg(unix)]
fn sync_parent_dir(parent: &Path) -> io::Result<()> {
    File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_parent: &Path) -> io::Result<()> {
    Ok(())
}

fn temp_path_in_parent(parent: &Path, final_path: &Path) -> io::Result<PathBuf> {
    let file_name = final_path
        .file_name()
        .and_then(|value| value.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid target filename"))?;
    let epoch_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| io::Error::other(err.to_string()))?
        .as_nanos();
    let counter = REPLACE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{TEMP_PREFIX}{file_name}.{epoch_nanos}.{}.{}",
        std::process::id(),
        counter
    );
    Ok(parent.join(tmp_name))
}

#[cfg(test)]
mod tests {
    use super::{TEMP_PREFIX, replace_file};
    use std::fs;

    #[test]
    fn replaces_existing_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobs_test.go");
        fs::write(&path, "package integration\n").expect("seed");

        replace_file(&path, b"package integration\n\n// edited\n").expect("replace");
        let content = fs::read_to_string(&path).expect("read content");
        assert_eq!(content, "package integration\n\n// edited\n");
    }

    #[test]
    fn refuses_to_create_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent_test.go");

        let err = replace_file(&path, b"x").expect_err("missing target");
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        assert!(!path.exists());
    }

    #[test]
    fn leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("remotes_test.go");
        fs::write(&path, "v0").expect("seed");

        replace_file(&path, b"v1").expect("write1");
        replace_file(&path, b"v2").expect("write2");

        let leftovers = fs::read_dir(dir.path())
            .expect("list dir")
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with(TEMP_PREFIX))
            .collect::<Vec<_>>();
        assert!(
            leftovers.is_empty(),
            "expected no temp files, found {leftovers:?}"
        );
    }

    #[cfg(unix)]
    #[test]
    fn writes_through_symlinks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let real = dir.path().join("real_test.go");
        let link = dir.path().join("linked_test.go");
        fs::write(&real, "v0").expect("seed");
        std::os::unix::fs::symlink(&real, &link).expect("symlink");

        replace_file(&link, b"v1").expect("replace");
        assert!(
            fs::symlink_metadata(&link)
                .expect("link metadata")
                .file_type()
                .is_symlink()
        );
        assert_eq!(fs::read_to_string(&real).expect("read real"), "v1");
    }

    #[cfg(unix)]
    #[test]
    fn keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("metrics_test.go");
        fs::write(&path, "v0").expect("seed");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).expect("chmod");

        replace_file(&path, b"v1").expect("replace");
        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}
