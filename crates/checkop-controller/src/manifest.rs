//! Seeds the store from a directory of record manifests.
//!
//! `*.json` files hold one record or an array of records. `*.toml` files
//! hold one record as a table, or several under a `records` array. Files are
//! read in name order; other files are ignored.

use std::path::{Path, PathBuf};

use checkop_storage::{RecordStore, StorageError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Reads every manifest in `dir`.
pub fn read_manifests(dir: &Path) -> Result<Vec<Value>, ManifestError> {
    let io_err = |source| ManifestError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut records = Vec::new();
    for path in paths {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => records.extend(parse_json(&path)?),
            Some("toml") => records.extend(parse_toml(&path)?),
            _ => debug!(path = %path.display(), "Skipping non-manifest file"),
        }
    }
    Ok(records)
}

fn read(path: &Path) -> Result<String, ManifestError> {
    std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_error(path: &Path, message: impl ToString) -> ManifestError {
    ManifestError::Parse {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn parse_json(path: &Path) -> Result<Vec<Value>, ManifestError> {
    let value: Value = serde_json::from_str(&read(path)?).map_err(|e| parse_error(path, e))?;
    match value {
        Value::Array(records) => Ok(records),
        Value::Object(_) => Ok(vec![value]),
        _ => Err(parse_error(path, "expected an object or an array of objects")),
    }
}

fn parse_toml(path: &Path) -> Result<Vec<Value>, ManifestError> {
    let mut value: Value = toml::from_str(&read(path)?).map_err(|e| parse_error(path, e))?;
    match value.get_mut("records").map(Value::take) {
        Some(Value::Array(records)) => Ok(records),
        Some(_) => Err(parse_error(path, "`records` must be an array of tables")),
        None => Ok(vec![value]),
    }
}

/// Creates every manifest in `dir` in the store and returns how many were
/// created.
pub async fn seed(store: &dyn RecordStore, dir: &Path) -> Result<usize, ManifestError> {
    let records = read_manifests(dir)?;
    for record in &records {
        let stored = store.create(record).await?;
        debug!(record = %stored.key, "Seeded record");
    }
    info!(dir = %dir.display(), count = records.len(), "Seeded manifests");
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use checkop_core::RecordKind;
    use checkop_db_memory::InMemoryStore;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_reads_json_and_toml_in_name_order() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("b-groups.toml"),
            r#"
[[records]]
kind = "Group"
metadata = { name = "ops" }

[[records]]
kind = "Group"
metadata = { name = "web" }
"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a-route.json"),
            r#"{"kind": "Route", "metadata": {"name": "shop", "namespace": "web"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "not a manifest").unwrap();

        let records = read_manifests(dir.path()).unwrap();
        let names: Vec<_> = records
            .iter()
            .map(|r| r["metadata"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["shop", "ops", "web"]);
    }

    #[test]
    fn test_single_toml_table() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("channel.toml"),
            "kind = \"AlertChannel\"\n[metadata]\nname = \"pager\"\n",
        )
        .unwrap();

        let records = read_manifests(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["kind"], "AlertChannel");
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let err = read_manifests(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[tokio::test]
    async fn test_seed_creates_records() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("records.json"),
            r#"[
                {"kind": "Group", "metadata": {"name": "ops"}},
                {"kind": "Secret", "metadata": {"name": "opsgenie", "namespace": "default"}, "data": {"apiKey": "k"}}
            ]"#,
        )
        .unwrap();

        let store = InMemoryStore::new();
        assert_eq!(seed(&store, dir.path()).await.unwrap(), 2);
        assert!(
            store
                .get(RecordKind::Secret, Some("default"), "opsgenie")
                .await
                .unwrap()
                .is_some()
        );
    }
}
