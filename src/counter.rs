use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, SowError};

pub const START_NUMBER: u32 = 1000;

/// File-backed SOW number sequence at `<root>/data/sow_counter.txt`.
///
/// The file holds the next number to hand out.
pub struct SowCounter {
    path: PathBuf,
}

impl SowCounter {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join("data").join("sow_counter.txt"),
        }
    }

    /// Current number, without consuming it. A missing or corrupt file reads as 1000.
    pub fn peek(&self) -> u32 {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return START_NUMBER;
        };
        match content.trim().parse::<u32>() {
            Ok(n) => n,
            Err(_) => {
                warn!(path = %self.path.display(), "unreadable SOW counter, restarting at {START_NUMBER}");
                START_NUMBER
            }
        }
    }

    /// Hands out the current number and stores its successor.
    pub fn next(&self) -> Result<u32> {
        let current = self.peek();
        let successor = current
            .checked_add(1)
            .ok_or_else(|| SowError::Config(format!("SOW counter exhausted at {current}")))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, successor.to_string())?;
        debug!(number = current, "consumed SOW number");
        Ok(current)
    }
}
