//! Loading API description documents from disk

use crate::document::Document;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} is not valid YAML: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path} does not contain an object at the top level")]
    NotAnObject { path: PathBuf },
}

/// Read a document, choosing JSON or YAML by extension.
///
/// Unknown extensions are tried as JSON first, then YAML.
pub fn load_document(path: &Path) -> Result<Document, DocumentError> {
    let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&content, path)
}

pub fn parse_document(content: &str, path: &Path) -> Result<Document, DocumentError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let value: Value = match extension.as_deref() {
        Some("json") => from_json(content, path)?,
        Some("yaml") | Some("yml") => from_yaml(content, path)?,
        _ => match from_json(content, path) {
            Ok(value) => value,
            Err(json_error) => {
                debug!("{} is not JSON ({}), trying YAML", path.display(), json_error);
                from_yaml(content, path)?
            }
        },
    };

    if !value.is_object() {
        return Err(DocumentError::NotAnObject {
            path: path.to_path_buf(),
        });
    }
    Ok(Document::new(value))
}

fn from_json(content: &str, path: &Path) -> Result<Value, DocumentError> {
    serde_json::from_str(content).map_err(|source| DocumentError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn from_yaml(content: &str, path: &Path) -> Result<Value, DocumentError> {
    serde_yaml::from_str(content).map_err(|source| DocumentError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const YAML: &str = "openapi: 3.0.3\ninfo:\n  title: Pets\n  version: 1.0.0\npaths:\n  /pets:\n    get:\n      responses:\n        '200':\n          description: ok\n";

    #[test]
    fn test_yaml_by_extension() {
        let doc = parse_document(YAML, Path::new("api.yaml")).expect("yaml parses");
        assert_eq!(doc.info_str("title"), Some("Pets"));
        assert_eq!(doc.paths().len(), 1);
    }

    #[test]
    fn test_unknown_extension_falls_back_to_yaml() {
        let doc = parse_document(YAML, Path::new("api.txt")).expect("yaml fallback");
        assert_eq!(doc.info_str("version"), Some("1.0.0"));
    }

    #[test]
    fn test_json_extension_is_strict() {
        let err = parse_document(YAML, Path::new("api.json")).unwrap_err();
        assert!(matches!(err, DocumentError::Json { .. }));
    }

    #[test]
    fn test_scalar_document_rejected() {
        let err = parse_document("42", Path::new("api.json")).unwrap_err();
        assert!(matches!(err, DocumentError::NotAnObject { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("openapi.yml");
        std::fs::write(&path, YAML).expect("write");
        assert!(load_document(&path).is_ok());
        assert!(matches!(
            load_document(&dir.path().join("missing.json")),
            Err(DocumentError::Io { .. })
        ));
    }
}
