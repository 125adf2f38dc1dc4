//! JSON file helpers shared by the rate store and the ledger storage.
//!
//! Every write goes to a sibling `<name>.tmp` file first and is then renamed
//! over the destination, so readers see either the old or the new document.
//! There is no locking; a single writer is assumed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

/// Sibling temp path used for atomic replacement of `path`.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("data"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Reads and parses a JSON document.
///
/// A missing file or one holding only whitespace yields `None`. Anything else
/// that fails to parse is an error naming the file.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };

    if content.trim().is_empty() {
        return Ok(None);
    }

    let value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON from {}", path.display()))?;
    Ok(Some(value))
}

/// Writes `bytes` to the temp sibling of `dest` and returns that path.
///
/// The destination itself is untouched until [`commit_temp`] runs.
pub(crate) async fn write_temp(dest: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    let tmp = temp_path(dest);
    fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write temp file {}", tmp.display()))?;
    Ok(tmp)
}

/// Atomically renames a temp file over `dest`.
pub(crate) async fn commit_temp(tmp: &Path, dest: &Path) -> Result<()> {
    fs::rename(tmp, dest)
        .await
        .with_context(|| format!("Failed to move {} into place", dest.display()))
}

/// Serializes `value` as pretty JSON and atomically replaces `dest` with it.
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(
    dest: &Path,
    value: &T,
) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    let tmp = write_temp(dest, content.as_bytes()).await?;
    commit_temp(&tmp, dest).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path_is_sibling() {
        let tmp = temp_path(Path::new("/data/rates.json"));
        assert_eq!(tmp, PathBuf::from("/data/rates.json.tmp"));
    }

    #[tokio::test]
    async fn test_read_json_missing_and_blank() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("users.json");
        assert!(read_json::<Vec<u32>>(&path).await?.is_none());

        std::fs::write(&path, "  \n")?;
        assert!(read_json::<Vec<u32>>(&path).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_read_json_corrupt_is_error() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("users.json");
        std::fs::write(&path, "[1, 2")?;

        let err = read_json::<Vec<u32>>(&path).await.unwrap_err();
        assert!(err.to_string().contains("users.json"));
        Ok(())
    }

    #[tokio::test]
    async fn test_write_json_atomic_creates_dirs_and_leaves_no_temp() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join("values.json");

        write_json_atomic(&path, &vec![1, 2, 3]).await?;

        assert_eq!(read_json::<Vec<u32>>(&path).await?, Some(vec![1, 2, 3]));
        assert!(!temp_path(&path).exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_interrupted_write_keeps_previous_content() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("values.json");
        write_json_atomic(&path, &vec![1]).await?;

        // Stop after the temp write, before the rename.
        write_temp(&path, b"[9, 9").await?;

        assert_eq!(read_json::<Vec<u32>>(&path).await?, Some(vec![1]));

        // The next full write replaces the stale temp file.
        write_json_atomic(&path, &vec![2]).await?;
        assert_eq!(read_json::<Vec<u32>>(&path).await?, Some(vec![2]));
        assert!(!temp_path(&path).exists());
        Ok(())
    }
}
