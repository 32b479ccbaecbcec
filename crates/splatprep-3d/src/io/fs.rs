use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// An error type for writing files under an [`OverwritePolicy`].
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// Error to create, write or rename a file.
    #[error("Failed to manipulate the file. {0}")]
    FileError(#[from] std::io::Error),

    /// The target exists and the policy forbids replacing it.
    #[error("File already exists: {0}")]
    AlreadyExists(PathBuf),
}

/// What to do when an output file already exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Fail before anything is written.
    #[default]
    Abort,
    /// Replace existing files.
    Overwrite,
    /// Copy existing files into `backup_dir`, then replace them.
    BackupThenOverwrite {
        /// Directory receiving the previous versions.
        backup_dir: PathBuf,
    },
}

/// Write a set of files, applying `policy` to the ones that already exist.
///
/// Each file is first written to a temporary sibling and then renamed over the
/// target, so a reader never observes a partially written file. With
/// [`OverwritePolicy::Abort`] every target is checked before the first write.
///
/// # Arguments
///
/// * `files` - Pairs of target path and content.
/// * `policy` - The overwrite policy.
pub fn write_files<P, C>(files: &[(P, C)], policy: &OverwritePolicy) -> Result<(), WriteError>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    match policy {
        OverwritePolicy::Abort => {
            if let Some((path, _)) = files.iter().find(|(path, _)| path.as_ref().exists()) {
                return Err(WriteError::AlreadyExists(path.as_ref().to_path_buf()));
            }
        }
        OverwritePolicy::Overwrite => {}
        OverwritePolicy::BackupThenOverwrite { backup_dir } => {
            for (path, _) in files {
                backup_file(path.as_ref(), backup_dir)?;
            }
        }
    }

    for (path, content) in files {
        write_atomic(path.as_ref(), content.as_ref())?;
    }

    Ok(())
}

/// Copy `path` into `backup_dir` if it exists.
///
/// Returns the backup path, or `None` when there was nothing to back up.
pub fn backup_file(path: &Path, backup_dir: &Path) -> Result<Option<PathBuf>, WriteError> {
    if !path.exists() {
        return Ok(None);
    }
    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
    })?;

    fs::create_dir_all(backup_dir)?;
    let backup_path = backup_dir.join(file_name);
    fs::copy(path, &backup_path)?;
    File::open(&backup_path)?.sync_all()?;

    log::info!("backed up {} to {}", path.display(), backup_path.display());

    Ok(Some(backup_path))
}

/// Write `content` to a temporary file next to `path` and rename it into place.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), WriteError> {
    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    log::debug!("wrote {} bytes to {}", content.len(), path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_checks_all_targets_first() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let a = tmp_dir.path().join("a.txt");
        let b = tmp_dir.path().join("b.txt");
        fs::write(&b, "old")?;

        let res = write_files(&[(&a, "new a"), (&b, "new b")], &OverwritePolicy::Abort);
        assert!(matches!(res, Err(WriteError::AlreadyExists(p)) if p == b));
        assert!(!a.exists());
        assert_eq!(fs::read_to_string(&b)?, "old");
        Ok(())
    }

    #[test]
    fn test_overwrite() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let a = tmp_dir.path().join("a.txt");
        fs::write(&a, "old")?;

        write_files(&[(&a, "new")], &OverwritePolicy::Overwrite)?;
        assert_eq!(fs::read_to_string(&a)?, "new");
        assert!(!tmp_dir.path().join("a.txt.tmp").exists());
        Ok(())
    }

    #[test]
    fn test_backup_then_overwrite() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let a = tmp_dir.path().join("a.txt");
        let b = tmp_dir.path().join("b.txt");
        fs::write(&a, "old")?;
        let backup_dir = tmp_dir.path().join("backup");

        let policy = OverwritePolicy::BackupThenOverwrite {
            backup_dir: backup_dir.clone(),
        };
        write_files(&[(&a, "new a"), (&b, "new b")], &policy)?;

        assert_eq!(fs::read_to_string(&a)?, "new a");
        assert_eq!(fs::read_to_string(&b)?, "new b");
        assert_eq!(fs::read_to_string(backup_dir.join("a.txt"))?, "old");
        assert!(!backup_dir.join("b.txt").exists());
        Ok(())
    }
}
