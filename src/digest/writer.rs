use crate::util::sanitize_file_stem;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while persisting a digest.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to create output directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create temporary file '{}': {source}", .path.display())]
    CreateTemp {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to rename '{}' to '{}': {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// Writes rendered digests into the output directory for one run.
///
/// File names are `<sanitized title>.html`. The writer remembers every name
/// it handed out; when a later feed sanitizes to a name already used in this
/// run, the first 8 hex digits of the SHA-256 of its feed URL are appended
/// instead of overwriting the earlier digest. Files left over from earlier
/// runs are overwritten.
#[derive(Debug)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
    claimed: HashSet<String>,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            claimed: HashSet::new(),
        }
    }

    /// Persists `html` for the feed and returns the artifact path.
    ///
    /// The output directory is created if missing. Content goes to a
    /// temporary file in the same directory which is synced and then renamed
    /// over the destination, so a digest is never left half written.
    pub fn write(
        &mut self,
        feed_title: &str,
        feed_url: &str,
        html: &str,
    ) -> Result<PathBuf, WriteError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| WriteError::CreateDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let file_name = self.claim_file_name(feed_title, feed_url);
        let path = self.output_dir.join(&file_name);
        write_atomically(&path, html.as_bytes())?;

        tracing::info!(path = %path.display(), bytes = html.len(), "Saved digest");
        Ok(path)
    }

    fn claim_file_name(&mut self, feed_title: &str, feed_url: &str) -> String {
        let stem = sanitize_file_stem(feed_title);

        let mut candidate = format!("{stem}.html");
        if self.claimed.contains(&candidate.to_lowercase()) {
            let hash = Sha256::digest(feed_url.as_bytes());
            let suffix: String = format!("{:x}", hash).chars().take(8).collect();
            candidate = format!("{stem}_{suffix}.html");

            // Same URL subscribed more than once
            let mut n = 2;
            while self.claimed.contains(&candidate.to_lowercase()) {
                candidate = format!("{stem}_{suffix}_{n}.html");
                n += 1;
            }

            tracing::warn!(
                title = %feed_title,
                file = %candidate,
                "Digest file name already used in this run, disambiguating"
            );
        }

        self.claimed.insert(candidate.to_lowercase());
        candidate
    }
}

fn write_atomically(path: &Path, content: &[u8]) -> Result<(), WriteError> {
    use std::time::{SystemTime, UNIX_EPOCH};

    // SEC-009: Randomized temp filename to prevent TOCTOU race conditions
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("html.tmp.{:016x}", random_suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|source| WriteError::CreateTemp {
            path: temp_path.clone(),
            source,
        })?;

    if let Err(source) = file.write_all(content).and_then(|()| file.sync_all()) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(WriteError::Write {
            path: temp_path,
            source,
        });
    }

    drop(file);

    // On Windows, rename fails if destination exists, so remove it first
    #[cfg(windows)]
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }

    std::fs::rename(&temp_path, path).map_err(|source| {
        let _ = std::fs::remove_file(&temp_path);
        WriteError::Rename {
            from: temp_path.clone(),
            to: path.to_path_buf(),
            source,
        }
    })
}
