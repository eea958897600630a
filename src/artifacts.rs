//! Reading command inputs and writing result artifacts.

use crate::error::Error;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Read a DSL file, checking that it is a YAML mapping.
///
/// The text is returned unchanged; the console does its own parsing.
pub fn read_dsl(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read DSL file {}", path.display()))?;
    let doc: serde_yaml::Value = serde_yaml::from_str(&text)
        .map_err(Error::from)
        .with_context(|| format!("{} is not valid YAML", path.display()))?;
    if !doc.is_mapping() {
        return Err(Error::Config(format!("{} must contain a YAML mapping", path.display())).into());
    }
    Ok(text)
}

/// Read a file that must hold a JSON object.
pub fn read_json_object(path: &Path, what: &str) -> Result<Map<String, Value>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_json_object(&text, what)
}

/// Parse text that must be a JSON object; `what` names the input in errors.
pub fn parse_json_object(text: &str, what: &str) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(text)
        .map_err(Error::from)
        .with_context(|| format!("{what} is not valid JSON"))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Config(format!("{what} must be a JSON object")).into()),
    }
}

/// Write text, creating parent directories.
pub fn write_text_file(path: &Path, text: &str) -> Result<()> {
    create_parent(path)?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write pretty-printed JSON, creating parent directories.
pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_text_file(path, &json)
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_read_dsl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.yml");
        let dsl = "app:\n  name: demo\n  mode: workflow\nkind: app\n";
        fs::write(&path, dsl).unwrap();
        assert_eq!(read_dsl(&path).unwrap(), dsl);
    }

    #[test]
    fn test_read_dsl_rejects_non_mapping() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.yml");
        fs::write(&path, "- a\n- b\n").unwrap();
        let err = read_dsl(&path).unwrap_err();
        assert!(err.to_string().contains("YAML mapping"));

        let path = dir.path().join("broken.yml");
        fs::write(&path, "app: [unclosed\n").unwrap();
        assert!(read_dsl(&path).is_err());
    }

    #[test]
    fn test_read_dsl_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_dsl(&dir.path().join("nope.yml")).unwrap_err();
        assert!(err.to_string().contains("nope.yml"));
    }

    #[test]
    fn test_parse_json_object() {
        let map = parse_json_object(r#"{"query": "hi"}"#, "--inputs-inline").unwrap();
        assert_eq!(map.get("query"), Some(&json!("hi")));

        let err = parse_json_object("[1, 2]", "--inputs-inline").unwrap_err();
        assert!(err.to_string().contains("--inputs-inline must be a JSON object"));
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));

        assert!(parse_json_object("{oops", "--inputs-inline").is_err());
    }

    #[test]
    fn test_write_json_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("artifacts/nested/run_result.json");
        write_json_file(&path, &json!({"text": "こんにちは", "n": 1})).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        // Non-ASCII is written as-is, not escaped.
        assert!(written.contains("こんにちは"));
        assert!(written.contains("\n  \"n\": 1"));

        let object = read_json_object(&path, "result").unwrap();
        assert_eq!(object.get("n"), Some(&json!(1)));
    }

    #[test]
    fn test_write_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/app.yml");
        write_text_file(&path, "app: {}\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "app: {}\n");
    }
}
