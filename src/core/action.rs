//! File actions extracted from a plan

use crate::core::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// Priority rank for essential structure
pub const PRIORITY_ESSENTIAL: u8 = 1;
/// Priority rank for regular components
pub const PRIORITY_COMPONENT: u8 = 2;
/// Priority rank for optional extras
pub const PRIORITY_OPTIONAL: u8 = 3;

/// Extensions treated as documentation when the model omits `fileType`
const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "rst", "adoc"];

/// What an action asks to do with its path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    Create,
    Modify,
    /// Anything else; never applied, always sent to manual review
    Other(String),
}

impl From<String> for Operation {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "create" => Operation::Create,
            "modify" => Operation::Modify,
            _ => Operation::Other(value),
        }
    }
}

impl From<Operation> for String {
    fn from(op: Operation) -> Self {
        op.to_string()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Modify => write!(f, "modify"),
            Operation::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Whether a file is meant for humans or for the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Code,
    Documentation,
}

impl FileType {
    /// Parse a model-supplied type name, accepting a few common spellings
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "code" | "source" => Some(FileType::Code),
            "documentation" | "docs" | "doc" => Some(FileType::Documentation),
            _ => None,
        }
    }

    /// Guess the type from a path's extension
    pub fn infer(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext {
            Some(ext) if DOC_EXTENSIONS.contains(&ext.as_str()) => FileType::Documentation,
            _ => FileType::Code,
        }
    }
}

/// One create/modify instruction extracted from a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAction {
    #[serde(rename = "action")]
    pub operation: Operation,

    /// Path relative to the materialization target
    pub path: String,

    /// Full or partial file content
    pub content: String,

    /// Model's own claim that the content is a finished implementation
    pub is_complete: bool,

    /// 1 = essential structure, 2 = component, 3 = optional
    pub priority: u8,

    pub file_type: FileType,
}

impl FileAction {
    pub fn create(path: &str, content: &str) -> Self {
        Self {
            operation: Operation::Create,
            path: path.to_string(),
            content: content.to_string(),
            is_complete: true,
            priority: PRIORITY_COMPONENT,
            file_type: FileType::infer(path),
        }
    }

    pub fn modify(path: &str, content: &str) -> Self {
        Self {
            operation: Operation::Modify,
            ..Self::create(path, content)
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = clamp_priority(priority);
        self
    }

    pub fn with_complete(mut self, is_complete: bool) -> Self {
        self.is_complete = is_complete;
        self
    }

    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }
}

/// Clamp a priority into the 1..=3 range
pub fn clamp_priority(priority: u8) -> u8 {
    priority.clamp(PRIORITY_ESSENTIAL, PRIORITY_OPTIONAL)
}

/// Check that `path` is a non-empty relative path without parent segments
pub fn validate_relative_path(path: &str) -> Result<&Path, PipelineError> {
    let invalid = |reason: &str| PipelineError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.trim().is_empty() {
        return Err(invalid("empty path"));
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(invalid("absolute path"));
    }
    // Windows drive prefixes are not caught by Path on unix hosts
    if path.len() >= 2 && path.as_bytes()[1] == b':' && path.as_bytes()[0].is_ascii_alphabetic() {
        return Err(invalid("absolute path"));
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(invalid("parent directory segment"));
    }

    let as_path = Path::new(path);
    for component in as_path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => return Err(invalid("absolute path")),
            Component::ParentDir => return Err(invalid("parent directory segment")),
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(as_path)
}
