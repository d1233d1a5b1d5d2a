//! # CRISK snapshot
//!
//! Turns the tracked-file listing into a bounded in-memory corpus.
//!
//! Per file, in listing order:
//! 1. skip binary / archive extensions,
//! 2. read bytes and decode lossily (invalid UTF-8 is replaced),
//! 3. skip silently on I/O failure or when the content exceeds the byte ceiling.

mod error;

pub use error::{Result, SnapshotError};

use crisk_protocol::CodebaseSnapshot;
use std::path::{Path, PathBuf};

/// Default content ceiling per file, in bytes.
pub const DEFAULT_MAX_FILE_BYTES: usize = 50_000;

/// Extensions never submitted for ranking.
pub const EXCLUDED_EXTENSIONS: &[&str] = &[
    // images
    "png",
    "jpg",
    "jpeg",
    "gif",
    "ico",
    // documents / archives
    "pdf",
    "zip",
    "tar",
    "gz",
    // lockfiles
    "lock",
];

#[derive(Debug, Clone)]
pub struct SnapshotPolicy {
    pub max_file_bytes: usize,
    pub excluded_extensions: Vec<String>,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            excluded_extensions: EXCLUDED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SnapshotPolicy {
    /// Extension match is case-insensitive (`logo.PNG` is excluded too).
    pub fn is_excluded(&self, path: &str) -> bool {
        let Some(ext) = Path::new(path).extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.excluded_extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(ext))
    }
}

/// Why files were left out of a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub included: usize,
    pub excluded_extension: usize,
    pub too_large: usize,
    pub unreadable: usize,
}

#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    root: PathBuf,
    policy: SnapshotPolicy,
}

impl SnapshotBuilder {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            policy: SnapshotPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(&self, tracked_files: &[String]) -> CodebaseSnapshot {
        self.build_with_stats(tracked_files).0
    }

    pub fn build_with_stats(&self, tracked_files: &[String]) -> (CodebaseSnapshot, SnapshotStats) {
        let mut snapshot = CodebaseSnapshot::new();
        let mut stats = SnapshotStats::default();

        for path in tracked_files {
            if path.is_empty() {
                continue;
            }
            if self.policy.is_excluded(path) {
                stats.excluded_extension += 1;
                continue;
            }
            match self.read_bounded(path) {
                Read::Content(content) => {
                    if snapshot.insert(path.as_str(), content) {
                        stats.included += 1;
                    }
                }
                Read::TooLarge(len) => {
                    log::debug!(
                        "Skipping large file {path} ({len} bytes > {})",
                        self.policy.max_file_bytes
                    );
                    stats.too_large += 1;
                }
                Read::Failed(err) => {
                    log::debug!("Skipping unreadable file {path}: {err}");
                    stats.unreadable += 1;
                }
            }
        }

        log::info!(
            "Snapshot: {} file(s), {} bytes (excluded {}, too large {}, unreadable {})",
            stats.included,
            snapshot.total_bytes(),
            stats.excluded_extension,
            stats.too_large,
            stats.unreadable
        );
        (snapshot, stats)
    }

    fn read_bounded(&self, path: &str) -> Read {
        let full = self.root.join(path);
        let limit = self.policy.max_file_bytes;

        // Lossy decoding can grow the text, so the decoded length is checked again below.
        match std::fs::metadata(&full) {
            Ok(meta) if !meta.is_file() => {
                return Read::Failed(std::io::Error::other("not a regular file"))
            }
            Ok(meta) if meta.len() > limit as u64 => return Read::TooLarge(meta.len() as usize),
            Ok(_) => {}
            Err(err) => return Read::Failed(err),
        }

        let bytes = match std::fs::read(&full) {
            Ok(bytes) => bytes,
            Err(err) => return Read::Failed(err),
        };
        let content = String::from_utf8_lossy(&bytes).into_owned();
        if content.len() > limit {
            return Read::TooLarge(content.len());
        }
        Read::Content(content)
    }
}

enum Read {
    Content(String),
    TooLarge(usize),
    Failed(std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn excludes_images_and_keeps_text() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.py"), "x".repeat(10)).unwrap();
        fs::write(temp.path().join("img.png"), [0x89, b'P', b'N', b'G']).unwrap();

        let snapshot = SnapshotBuilder::new(temp.path()).build(&paths(&["a.py", "img.png"]));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.entries()[0].filename, "a.py");
        assert_eq!(snapshot.entries()[0].content, "x".repeat(10));
    }

    #[test]
    fn excluded_extensions_never_read() {
        let temp = tempdir().unwrap();
        let listing = paths(&[
            "logo.PNG", "photo.jpg", "photo.jpeg", "anim.gif", "favicon.ico", "doc.pdf",
            "bundle.zip", "src.tar", "src.tar.gz", "Cargo.lock",
        ]);
        for path in &listing {
            fs::write(temp.path().join(path), "text").unwrap();
        }

        let (snapshot, stats) = SnapshotBuilder::new(temp.path()).build_with_stats(&listing);

        assert!(snapshot.is_empty());
        assert_eq!(stats.excluded_extension, listing.len());
    }

    #[test]
    fn skips_oversized_and_missing_files() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("big.rs"), "y".repeat(64)).unwrap();
        fs::write(temp.path().join("small.rs"), "fn main() {}").unwrap();
        fs::create_dir(temp.path().join("vendored")).unwrap();

        let policy = SnapshotPolicy {
            max_file_bytes: 32,
            ..SnapshotPolicy::default()
        };
        let (snapshot, stats) = SnapshotBuilder::new(temp.path())
            .with_policy(policy)
            .build_with_stats(&paths(&["big.rs", "gone.rs", "vendored", "small.rs"]));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.entries()[0].filename, "small.rs");
        assert_eq!(
            stats,
            SnapshotStats {
                included: 1,
                excluded_extension: 0,
                too_large: 1,
                unreadable: 2,
            }
        );
    }

    #[test]
    fn content_at_ceiling_is_included() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("edge.txt"), "z".repeat(DEFAULT_MAX_FILE_BYTES)).unwrap();

        let snapshot = SnapshotBuilder::new(temp.path()).build(&paths(&["edge.txt"]));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("latin1.txt"), [b'c', b'a', b'f', 0xE9]).unwrap();

        let snapshot = SnapshotBuilder::new(temp.path()).build(&paths(&["latin1.txt"]));
        assert_eq!(snapshot.entries()[0].content, "caf\u{FFFD}");
    }

    #[test]
    fn preserves_listing_order_and_unique_paths() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("b.rs"), "b").unwrap();
        fs::write(temp.path().join("a.rs"), "a").unwrap();

        let snapshot = SnapshotBuilder::new(temp.path()).build(&paths(&["b.rs", "a.rs", "b.rs"]));
        let names: Vec<_> = snapshot.entries().iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["b.rs", "a.rs"]);
    }
}
