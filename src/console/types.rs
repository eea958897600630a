//! Request and response types for the console endpoints.

use crate::console::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub remember_me: bool,
}

/// Where the imported DSL comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportMode {
    YamlContent,
    YamlUrl,
}

/// Parameters for `POST /apps/imports`.
///
/// Exactly one of `yaml_content` and `yaml_url` must be set. Setting
/// `app_id` overwrites that app instead of creating a new one.
#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    pub yaml_content: Option<String>,
    pub yaml_url: Option<String>,
    pub app_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon_type: Option<String>,
    pub icon: Option<String>,
    pub icon_background: Option<String>,
}

impl ImportRequest {
    pub fn from_content(yaml_content: impl Into<String>) -> Self {
        Self {
            yaml_content: Some(yaml_content.into()),
            ..Self::default()
        }
    }

    pub fn from_url(yaml_url: impl Into<String>) -> Self {
        Self {
            yaml_url: Some(yaml_url.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Validate the source and build the sparse request body.
    pub(crate) fn payload(&self) -> Result<ImportPayload<'_>, Error> {
        let content = non_empty(&self.yaml_content);
        let url = non_empty(&self.yaml_url);

        let mode = match (content, url) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidInput(
                    "yaml_content and yaml_url are mutually exclusive".into(),
                ));
            }
            (None, None) => {
                return Err(Error::InvalidInput(
                    "one of yaml_content or yaml_url is required".into(),
                ));
            }
            (Some(_), None) => ImportMode::YamlContent,
            (None, Some(_)) => ImportMode::YamlUrl,
        };

        Ok(ImportPayload {
            mode,
            yaml_content: content,
            yaml_url: url,
            name: self.name.as_deref(),
            description: self.description.as_deref(),
            icon_type: self.icon_type.as_deref(),
            icon: self.icon.as_deref(),
            icon_background: self.icon_background.as_deref(),
            app_id: self.app_id.as_deref(),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[derive(Debug, Serialize)]
pub(crate) struct ImportPayload<'a> {
    pub mode: ImportMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaml_content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaml_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_background: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<&'a str>,
}

/// Import state reported by the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStatus {
    Completed,
    CompletedWithWarnings,
    /// DSL version mismatch; must be confirmed before it takes effect.
    Pending,
    Failed,
    Other(String),
}

impl ImportStatus {
    fn parse(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "completed-with-warnings" => Self::CompletedWithWarnings,
            "pending" => Self::Pending,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Body of an import or confirm response, kept exactly as the server sent it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportResult(Map<String, Value>);

impl ImportResult {
    /// Import id, needed to confirm a pending import.
    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    /// Id of the created or overwritten app, once the import completed.
    pub fn app_id(&self) -> Option<&str> {
        self.str_field("app_id")
    }

    pub fn status(&self) -> Option<ImportStatus> {
        self.str_field("status").map(ImportStatus::parse)
    }

    pub fn is_pending(&self) -> bool {
        self.status() == Some(ImportStatus::Pending)
    }

    /// Server-side error text for failed imports.
    pub fn error(&self) -> Option<&str> {
        self.str_field("error").filter(|s| !s.is_empty())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for ImportResult {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Body of `POST /apps/{id}/workflows/draft/run`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunRequest {
    pub inputs: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<Value>>,
}

impl RunRequest {
    pub fn new(inputs: Map<String, Value>) -> Self {
        Self {
            inputs,
            files: None,
        }
    }

    #[must_use]
    pub fn with_files(mut self, files: Vec<Value>) -> Self {
        self.files = Some(files);
        self
    }
}

/// Events collected from a draft run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCollection {
    pub events: Vec<Value>,
    pub last_event: Option<Value>,
}

impl RunCollection {
    pub fn push(&mut self, event: Value) {
        self.last_event = Some(event.clone());
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
