//! JSON sidecar holding the last build's metadata.
//!
//! The document is an explicit value: [`ConfigStore::load`] hands it to the
//! caller, who mutates it and passes it back to [`ConfigStore::save`]. Keys
//! are written in sorted order with pretty indentation. Reading and writing
//! problems never abort a build; they surface as non-fatal errors.

use crate::builder::{BuildRequest, BuildResult, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Key under which the most recent build is stored.
pub const LAST_BUILD_KEY: &str = "last_build";

/// Config document: string keys to arbitrary JSON values.
pub type Document = serde_json::Map<String, Value>;

/// Metadata persisted for the most recent successful build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastBuild {
    pub script: String,
    pub output: String,
    pub icon: Option<String>,
    pub onefile: bool,
    pub console: bool,
    /// Artifact size in megabytes
    pub size: f64,
    /// Build duration in seconds
    pub time: f64,
    pub date: String,
    pub platform: String,
    pub python_version: String,
    #[serde(default)]
    pub sha256: String,
}

impl LastBuild {
    pub fn new(request: &BuildRequest, result: &BuildResult, python_version: &str) -> Self {
        Self {
            script: request.script.display().to_string(),
            output: result.artifact.display().to_string(),
            icon: request.icon.as_ref().map(|p| p.display().to_string()),
            onefile: request.is_onefile(),
            console: request.shows_console(),
            size: round2(result.size_mb()),
            time: round2(result.elapsed.as_secs_f64()),
            date: result.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            platform: result.platform.to_string(),
            python_version: python_version.to_string(),
            sha256: result.sha256.clone(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Store `record` under [`LAST_BUILD_KEY`], replacing any previous entry.
pub fn record_last_build(document: &mut Document, record: &LastBuild) -> Result<()> {
    let value = serde_json::to_value(record)
        .map_err(|e| Error::GenericError(format!("serializing build record: {e}")))?;
    document.insert(LAST_BUILD_KEY.to_string(), value);
    Ok(())
}

/// The stored build record, if present and well-formed.
pub fn last_build(document: &Document) -> Option<LastBuild> {
    document
        .get(LAST_BUILD_KEY)
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
}

/// Reads and writes the config document at one path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, falling back to an empty one.
    ///
    /// A missing file is silently empty; an unreadable or malformed file is
    /// reported through the logger.
    pub async fn load(&self) -> Document {
        match self.try_load().await {
            Ok(document) => document,
            Err(e) => {
                log::warn!("{e}; starting with an empty config");
                Document::new()
            }
        }
    }

    /// Load the document, reporting malformed content as [`Error::ConfigParse`].
    pub async fn try_load(&self) -> Result<Document> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Config file {} does not exist yet", self.path.display());
                return Ok(Document::new());
            }
            Err(e) => {
                return Err(Error::ConfigParse {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(other) => Err(Error::ConfigParse {
                path: self.path.clone(),
                reason: format!("expected a JSON object, found {}", json_kind(&other)),
            }),
            Err(e) => Err(Error::ConfigParse {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Write the document atomically (temp file in the same directory, then rename).
    ///
    /// # Errors
    ///
    /// [`Error::ConfigWrite`] if the target cannot be written.
    pub async fn save(&self, document: &Document) -> Result<()> {
        let mut content = serde_json::to_string_pretty(document)
            .map_err(|e| Error::GenericError(format!("serializing config: {e}")))?;
        content.push('\n');

        let write_error = |error: std::io::Error| Error::ConfigWrite {
            path: self.path.clone(),
            error,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }

        let temp = self.temp_path();
        if let Err(e) = tokio::fs::write(&temp, content.as_bytes()).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(write_error(e));
        }
        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(write_error(e));
        }

        log::debug!("Saved config to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = std::ffi::OsString::from(".");
        name.push(self.path.file_name().unwrap_or_else(|| "config.json".as_ref()));
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Platform;
    use serde_json::json;
    use std::time::Duration;

    fn sample_record() -> LastBuild {
        let request = BuildRequest::builder("app.py").icon("app.ico").build().unwrap();
        let result = BuildResult {
            artifact: PathBuf::from("dist/app"),
            size: 5 * 1024 * 1024 + 300_000,
            elapsed: Duration::from_millis(12_346),
            timestamp: chrono::Local::now(),
            platform: Platform::Linux,
            sha256: "ab".repeat(32),
        };
        LastBuild::new(&request, &result, "3.12.1")
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nope.json"));
        assert!(store.load().await.is_empty());
        assert!(store.try_load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_file_loads_empty_but_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = ConfigStore::new(&path);

        assert!(store.load().await.is_empty());
        assert!(matches!(
            store.try_load().await.unwrap_err(),
            Error::ConfigParse { .. }
        ));

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn round_trip_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cfg.json");
        let store = ConfigStore::new(&path);

        let mut original = Document::new();
        original.insert("zeta".into(), json!({"b": 1, "a": [1, 2, 3]}));
        original.insert("alpha".into(), json!("keep me"));
        store.save(&original).await.unwrap();

        let mut loaded = store.load().await;
        assert_eq!(loaded, original);

        let record = sample_record();
        record_last_build(&mut loaded, &record).unwrap();
        store.save(&loaded).await.unwrap();

        let reloaded = store.load().await;
        assert_eq!(reloaded.get("alpha"), original.get("alpha"));
        assert_eq!(reloaded.get("zeta"), original.get("zeta"));
        assert_eq!(last_build(&reloaded), Some(record));

        let text = std::fs::read_to_string(&path).unwrap();
        let alpha = text.find("\"alpha\"").unwrap();
        let last = text.find("\"last_build\"").unwrap();
        let zeta = text.find("\"zeta\"").unwrap();
        assert!(alpha < last && last < zeta);
        assert!(text.contains("\n  "));
    }

    #[test]
    fn record_rounds_size_and_time() {
        let record = sample_record();
        assert_eq!(record.size, 5.29);
        assert_eq!(record.time, 12.35);
        assert!(record.onefile);
        assert!(record.console);
        assert_eq!(record.icon.as_deref(), Some("app.ico"));
        assert_eq!(record.platform, "linux");
    }

    #[test]
    fn last_build_is_overwritten() {
        let mut document = Document::new();
        let mut record = sample_record();
        record_last_build(&mut document, &record).unwrap();
        record.output = "dist/other".into();
        record_last_build(&mut document, &record).unwrap();

        assert_eq!(document.len(), 1);
        assert_eq!(last_build(&document).unwrap().output, "dist/other");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unwritable_target_is_config_write() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let store = ConfigStore::new(blocker.join("cfg.json"));

        let err = store.save(&Document::new()).await.unwrap_err();
        assert!(matches!(err, Error::ConfigWrite { .. }));
        assert!(!err.is_fatal());
    }
}
