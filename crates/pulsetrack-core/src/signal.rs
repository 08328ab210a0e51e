//! Raw activity signals from the host editor and their heartbeat payloads.
//!
//! The signal adapter boundary is deliberately thin: whatever the host can
//! supply arrives as optional fields, and anything missing is substituted
//! with `"unknown"` when the payload is built — a missing field is never an
//! error at this layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Sentinel for signal fields the host could not supply.
pub const UNKNOWN_FIELD: &str = "unknown";

/// One raw activity observation from the host editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySignal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    /// Observation time; absent means "when the tracker saw it".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ActivitySignal {
    /// Build the heartbeat `data` payload, substituting [`UNKNOWN_FIELD`]
    /// for every absent field.
    pub fn data(&self) -> Map<String, Value> {
        let field = |v: &Option<String>| {
            Value::String(v.clone().unwrap_or_else(|| UNKNOWN_FIELD.to_owned()))
        };
        let mut data = Map::new();
        data.insert("language".to_owned(), field(&self.language));
        data.insert("project".to_owned(), field(&self.project));
        data.insert("file".to_owned(), field(&self.file));
        data.insert("branch".to_owned(), field(&self.branch));
        data.insert("editor".to_owned(), field(&self.editor));
        data.insert("workspace".to_owned(), field(&self.workspace));
        data
    }
}

// ─── Workspace resolution ─────────────────────────────────────────

/// Strategy for picking a project name when the host has multiple workspace
/// folders open and the signal carries none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkspaceStrategy {
    /// Always report the first configured folder.
    #[default]
    FirstFolder,
    /// Pick the folder whose name occurs in the active file path, falling
    /// back to the first folder.
    MatchFilePath,
}

impl WorkspaceStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstFolder => "first",
            Self::MatchFilePath => "match",
        }
    }
}

impl fmt::Display for WorkspaceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkspaceStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(Self::FirstFolder),
            "match" => Ok(Self::MatchFilePath),
            _ => Err(format!("unknown workspace strategy: {s} (expected first|match)")),
        }
    }
}

/// Resolve a project name from configured workspace folders.
///
/// Returns `None` when no folders are configured; the caller substitutes
/// [`UNKNOWN_FIELD`] as with any other missing signal field.
pub fn resolve_project(
    strategy: WorkspaceStrategy,
    folders: &[String],
    file: Option<&str>,
) -> Option<String> {
    match strategy {
        WorkspaceStrategy::FirstFolder => folders.first().cloned(),
        WorkspaceStrategy::MatchFilePath => {
            if let Some(path) = file {
                if let Some(hit) = folders.iter().find(|f| path.contains(f.as_str())) {
                    return Some(hit.clone());
                }
            }
            folders.first().cloned()
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_substitutes_unknown_for_missing_fields() {
        let signal = ActivitySignal {
            file: Some("src/main.rs".to_owned()),
            language: Some("rust".to_owned()),
            ..Default::default()
        };
        let data = signal.data();
        assert_eq!(data["file"], "src/main.rs");
        assert_eq!(data["language"], "rust");
        assert_eq!(data["project"], UNKNOWN_FIELD);
        assert_eq!(data["branch"], UNKNOWN_FIELD);
        assert_eq!(data["editor"], UNKNOWN_FIELD);
        assert_eq!(data["workspace"], UNKNOWN_FIELD);
    }

    #[test]
    fn empty_signal_yields_all_unknown() {
        let data = ActivitySignal::default().data();
        assert_eq!(data.len(), 6);
        assert!(data.values().all(|v| v == UNKNOWN_FIELD));
    }

    #[test]
    fn signal_deserializes_from_partial_json() {
        let signal: ActivitySignal =
            serde_json::from_str(r#"{"file":"a.ts","branch":"main"}"#).expect("parse");
        assert_eq!(signal.file.as_deref(), Some("a.ts"));
        assert_eq!(signal.branch.as_deref(), Some("main"));
        assert!(signal.language.is_none());
    }

    #[test]
    fn strategy_parse_and_display() {
        assert_eq!(
            "first".parse::<WorkspaceStrategy>().expect("parse"),
            WorkspaceStrategy::FirstFolder
        );
        assert_eq!(
            "MATCH".parse::<WorkspaceStrategy>().expect("parse"),
            WorkspaceStrategy::MatchFilePath
        );
        assert!("nearest".parse::<WorkspaceStrategy>().is_err());
        assert_eq!(WorkspaceStrategy::MatchFilePath.to_string(), "match");
    }

    #[test]
    fn first_folder_strategy_picks_head() {
        let folders = vec!["alpha".to_owned(), "beta".to_owned()];
        assert_eq!(
            resolve_project(WorkspaceStrategy::FirstFolder, &folders, Some("/beta/x.rs")),
            Some("alpha".to_owned())
        );
    }

    #[test]
    fn match_strategy_prefers_path_hit() {
        let folders = vec!["alpha".to_owned(), "beta".to_owned()];
        assert_eq!(
            resolve_project(
                WorkspaceStrategy::MatchFilePath,
                &folders,
                Some("/home/u/beta/src/x.rs")
            ),
            Some("beta".to_owned())
        );
    }

    #[test]
    fn match_strategy_falls_back_to_first() {
        let folders = vec!["alpha".to_owned(), "beta".to_owned()];
        assert_eq!(
            resolve_project(WorkspaceStrategy::MatchFilePath, &folders, Some("/tmp/x.rs")),
            Some("alpha".to_owned())
        );
        assert_eq!(
            resolve_project(WorkspaceStrategy::MatchFilePath, &folders, None),
            Some("alpha".to_owned())
        );
    }

    #[test]
    fn no_folders_resolves_none() {
        assert_eq!(
            resolve_project(WorkspaceStrategy::FirstFolder, &[], Some("/a/b.rs")),
            None
        );
    }
}
