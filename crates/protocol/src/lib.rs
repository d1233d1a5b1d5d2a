//! # CRISK protocol
//!
//! Data model shared by every stage of the change risk pipeline, plus the JSON
//! wire types spoken to the external collaborators (see [`wire`]).
//!
//! ```text
//! ChangeSet ──┐
//!             ├──> ranking ──> RelatedFile* ──> ownership ──> Report
//! Snapshot ───┘
//! ```

use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

pub mod wire;

/// Sentinel rendered when a file's owner cannot be determined.
pub const UNKNOWN_OWNER: &str = "unknown";

/// Staged changes captured once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub diff_text: String,
    pub staged_files: Vec<String>,
}

impl ChangeSet {
    pub fn new(diff_text: impl Into<String>, staged_files: Vec<String>) -> Self {
        Self {
            diff_text: diff_text.into(),
            staged_files,
        }
    }

    /// A change set needs both a diff and at least one staged path to be analyzed.
    pub fn is_empty(&self) -> bool {
        self.diff_text.is_empty() || self.staged_files.is_empty()
    }

    pub fn is_staged(&self, path: &str) -> bool {
        self.staged_files.iter().any(|staged| staged == path)
    }
}

/// Best-effort identity of the repository, used for server-side caching and display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoIdentity {
    pub remote: Option<String>,
    pub revision: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub filename: String,
    pub content: String,
}

/// In-memory corpus of tracked files, in tracked-file listing order.
///
/// Serializes as the bare entry list; deserializing drops repeated paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<SnapshotEntry>")]
pub struct CodebaseSnapshot {
    entries: Vec<SnapshotEntry>,
    paths: HashSet<String>,
}

impl CodebaseSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry unless the path is already present. Returns whether it was added.
    pub fn insert(&mut self, filename: impl Into<String>, content: impl Into<String>) -> bool {
        let filename = filename.into();
        if !self.paths.insert(filename.clone()) {
            return false;
        }
        self.entries.push(SnapshotEntry {
            filename,
            content: content.into(),
        });
        true
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.paths.contains(filename)
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|entry| entry.content.len()).sum()
    }
}

impl From<Vec<SnapshotEntry>> for CodebaseSnapshot {
    fn from(entries: Vec<SnapshotEntry>) -> Self {
        let mut snapshot = Self::new();
        for entry in entries {
            snapshot.insert(entry.filename, entry.content);
        }
        snapshot
    }
}

impl Serialize for CodebaseSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

/// Dominant historical author of a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OwnerIdentity {
    Known(String),
    Unknown,
}

impl OwnerIdentity {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(identity) => identity,
            Self::Unknown => UNKNOWN_OWNER,
        }
    }
}

impl From<String> for OwnerIdentity {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == UNKNOWN_OWNER {
            Self::Unknown
        } else {
            Self::Known(trimmed.to_string())
        }
    }
}

impl From<OwnerIdentity> for String {
    fn from(value: OwnerIdentity) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for OwnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file the scoring collaborator considers impacted by the change set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedFile {
    pub path: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerIdentity>,
}

impl RelatedFile {
    pub fn new(path: impl Into<String>, score: f64) -> Self {
        Self {
            path: path.into(),
            score,
            owner: None,
        }
    }

    pub fn owner_or_unknown(&self) -> OwnerIdentity {
        self.owner.clone().unwrap_or(OwnerIdentity::Unknown)
    }
}

/// Owner and the related files attributed to them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipient {
    pub owner: OwnerIdentity,
    pub files: Vec<String>,
}

/// Final artifact of one pipeline run. Rendered once, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub change_set: ChangeSet,
    pub repository: RepoIdentity,
    pub related_files: Vec<RelatedFile>,
    pub draft_message: Option<String>,
}

impl Report {
    /// Groups related files by owner, owners in first-appearance order.
    pub fn recipients(&self) -> Vec<Recipient> {
        let mut recipients: Vec<Recipient> = Vec::new();
        for file in &self.related_files {
            let owner = file.owner_or_unknown();
            match recipients.iter_mut().find(|r| r.owner == owner) {
                Some(recipient) => recipient.files.push(file.path.clone()),
                None => recipients.push(Recipient {
                    owner,
                    files: vec![file.path.clone()],
                }),
            }
        }
        recipients
    }
}
