use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Append-only log of raw feed frames, one per line, in arrival order.
///
/// Clones share one writer lock, so frames from concurrent sessions never
/// interleave within a line.
#[derive(Clone, Debug)]
pub struct FrameLog {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FrameLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, frame: &str) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(f, "{}", frame.trim_end_matches(['\r', '\n']))?;
        Ok(())
    }

    /// Every stored line, in file order.
    pub async fn read_lines(&self) -> std::io::Result<Vec<String>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(content.lines().map(str::to_string).collect())
    }
}
