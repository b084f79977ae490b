//! Append-only review history kept next to the decks as JSON lines.

use crate::codec::write_atomic;
use deckard_core::{CoreError, Review};
use log::warn;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const LOG_DIR: &str = ".deckard";
pub const LOG_FILE: &str = "reviews.jsonl";

pub struct ReviewLog {
    root: PathBuf,
    path: PathBuf,
}

impl ReviewLog {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            path: root.join(LOG_DIR).join(LOG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the history. A missing file is an empty history; lines that do
    /// not parse are skipped.
    pub fn load(&self) -> Result<Vec<Review>, CoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::io(&self.path, e)),
        };
        let mut out = Vec::new();
        for (n, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Review>(line) {
                Ok(mut r) => {
                    r.card = self.root.join(&r.card);
                    out.push(r);
                }
                Err(e) => warn!("{}:{}: skipping review entry: {e}", self.path.display(), n + 1),
            }
        }
        Ok(out)
    }

    pub fn append(&self, review: &Review) -> Result<(), CoreError> {
        let line = self.encode(review)?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| CoreError::io(dir, e))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CoreError::io(&self.path, e))?;
        f.write_all(line.as_bytes()).map_err(|e| CoreError::io(&self.path, e))
    }

    /// Replaces the whole history in one atomic write.
    pub fn rewrite(&self, reviews: &[Review]) -> Result<(), CoreError> {
        let mut buf = String::new();
        for r in reviews {
            buf.push_str(&self.encode(r)?);
        }
        write_atomic(&self.path, buf.as_bytes())
    }

    // Paths are stored relative to the root so the deck folder can move.
    fn encode(&self, review: &Review) -> Result<String, CoreError> {
        let mut r = review.clone();
        if let Ok(rel) = review.card.strip_prefix(&self.root) {
            r.card = rel.to_path_buf();
        }
        let mut line = serde_json::to_string(&r)
            .map_err(|e| CoreError::invariant(format!("cannot encode review: {e}")))?;
        line.push('\n');
        Ok(line)
    }
}

/// Points history entries under `from` at `to` instead. Returns whether
/// anything changed.
pub fn relocate(reviews: &mut [Review], from: &Path, to: &Path) -> bool {
    let mut changed = false;
    for r in reviews.iter_mut() {
        if let Ok(rest) = r.card.strip_prefix(from) {
            r.card = if rest.as_os_str().is_empty() {
                to.to_path_buf()
            } else {
                to.join(rest)
            };
            changed = true;
        }
    }
    changed
}
