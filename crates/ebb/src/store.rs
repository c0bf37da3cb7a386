//! Atomic JSON persistence for named migration blobs.

use crate::error::{MigrateError, MigrateResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Validate that a migration name is safe for use as a file name.
/// Rejects empty names, path separators, `..`, and control characters.
pub(crate) fn validate_name(name: &str) -> MigrateResult<()> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.chars().any(|c| c.is_control())
    {
        return Err(MigrateError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn blob_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

/// Serialize `value` and write it under `dir/name.json`.
///
/// The write goes through a uniquely named temp file in the same directory,
/// flushed and synced before a rename over the destination.
pub(crate) async fn store_json<T: Serialize>(
    dir: &Path,
    name: &str,
    value: &T,
) -> MigrateResult<()> {
    validate_name(name)?;
    if !dir.exists() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let path = blob_path(dir, name);
    let content = serde_json::to_vec(value)?;
    let tmp_path = dir.join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    let write_result = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&content).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok::<(), std::io::Error>(())
    }
    .await;

    if let Err(err) = write_result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(MigrateError::Io(err));
    }
    tracing::debug!(path = %path.display(), "stored migration blob");
    Ok(())
}

/// Read and deserialize `dir/name.json`.
pub(crate) async fn load_json<T: DeserializeOwned>(dir: &Path, name: &str) -> MigrateResult<T> {
    validate_name(name)?;
    let content = tokio::fs::read(blob_path(dir, name)).await?;
    Ok(serde_json::from_slice(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn store_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let value = json!({"a": 1, "b": ["x", "y"]});
        store_json(dir.path(), "sample", &value).await.unwrap();

        let loaded: serde_json::Value = load_json(dir.path(), "sample").await.unwrap();
        assert_eq!(loaded, value);

        // No temp files left behind.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn store_creates_the_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("deep/storage");
        store_json(&nested, "sample", &json!({})).await.unwrap();
        assert!(nested.join("sample.json").exists());
    }

    #[test]
    fn hostile_names_are_rejected() {
        assert!(validate_name("fine_name-2024").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a\0b").is_err());
    }
}
