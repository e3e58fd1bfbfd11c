//! File Helpers
//!
//! Shared plumbing of the file-backed stores: whole-file atomic
//! replacement and JSON Lines tables.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;

/// Replace `path` with `content` through a sibling temp file
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = Path::new(&tmp_name);

    let mut file = fs::File::create(tmp).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(tmp, path).await?;
    Ok(())
}

/// Read a whole JSON document; `None` when the file does not exist
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write a whole JSON document atomically
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &content).await
}

/// Load every row of a JSON Lines file
///
/// A trailing line without its newline is the remains of an interrupted
/// append: it is dropped and the file rewritten without it. A malformed
/// line anywhere else is an error.
pub(crate) async fn read_lines<T>(path: &Path) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned + Serialize,
{
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let torn = !content.is_empty() && !content.ends_with('\n');
    let mut lines: Vec<&str> = content.lines().collect();
    if torn {
        lines.pop();
    }

    let mut rows = Vec::with_capacity(lines.len());
    for line in lines.into_iter().filter(|l| !l.trim().is_empty()) {
        rows.push(serde_json::from_str(line)?);
    }

    if torn {
        tracing::warn!(path = %path.display(), "Dropping incomplete trailing row");
        rewrite_lines(path, &rows).await?;
    }

    Ok(rows)
}

/// Append one row and flush it to disk
pub(crate) async fn append_line<T: Serialize>(path: &Path, row: &T) -> Result<(), StoreError> {
    let mut line = serde_json::to_vec(row)?;
    line.push(b'\n');

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(&line).await?;
    file.sync_data().await?;
    Ok(())
}

/// Replace a JSON Lines file with `rows`
pub(crate) async fn rewrite_lines<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    let mut content = Vec::new();
    for row in rows {
        serde_json::to_writer(&mut content, row)?;
        content.push(b'\n');
    }
    write_atomic(path, &content).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_append_and_read_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("rows.jsonl");

        append_line(&path, &json!({"n": 1})).await.unwrap();
        append_line(&path, &json!({"n": 2})).await.unwrap();

        let rows: Vec<Value> = read_lines(&path).await.unwrap();
        assert_eq!(rows, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[tokio::test]
    async fn test_incomplete_trailing_row_is_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        fs::write(&path, "{\"n\":1}\n{\"n\":").await.unwrap();

        let rows: Vec<Value> = read_lines(&path).await.unwrap();
        assert_eq!(rows, vec![json!({"n": 1})]);

        // The next append starts on a clean line
        append_line(&path, &json!({"n": 3})).await.unwrap();
        let rows: Vec<Value> = read_lines(&path).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_middle_row_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        fs::write(&path, "garbage\n{\"n\":1}\n").await.unwrap();

        let result: Result<Vec<Value>, _> = read_lines(&path).await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");

        write_json(&path, &json!({"a": 1})).await.unwrap();
        let doc: Option<Value> = read_json(&path).await.unwrap();
        assert_eq!(doc, Some(json!({"a": 1})));
        assert!(!dir.path().join("doc.json.tmp").exists());
    }
}
