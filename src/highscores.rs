//! Persist the high score to disk (XDG config or ~/.config/colorchain).

use crate::score::HighScoreStore;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const FILENAME: &str = "highscore";

/// Single-integer high score file.
#[derive(Debug, Clone)]
pub struct FileHighScores {
    path: PathBuf,
}

impl FileHighScores {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<app dir>/highscore`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HighScoreStore for FileHighScores {
    /// 0 on missing file or parse error.
    fn load(&self) -> u64 {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.lines().next().and_then(|l| l.trim().parse::<u64>().ok()))
            .unwrap_or(0)
    }

    /// Creates the parent directory if needed.
    fn save(&mut self, high_score: u64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&self.path, format!("{}\n", high_score))
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("colorchain-test-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_missing_file_loads_zero() {
        let store = FileHighScores::in_dir(&scratch_dir("missing"));
        assert_eq!(store.load(), 0);
    }

    #[test]
    fn test_save_then_load() {
        let dir = scratch_dir("roundtrip");
        let mut store = FileHighScores::in_dir(&dir.join("nested"));
        store.save(2531).unwrap();
        assert_eq!(FileHighScores::in_dir(&dir.join("nested")).load(), 2531);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_garbage_loads_zero() {
        let dir = scratch_dir("garbage");
        fs::create_dir_all(&dir).unwrap();
        let store = FileHighScores::in_dir(&dir);
        fs::write(store.path(), "not a number\n").unwrap();
        assert_eq!(store.load(), 0);
        let _ = fs::remove_dir_all(dir);
    }
}
