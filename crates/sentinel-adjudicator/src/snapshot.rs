//! Disk snapshots of adjudicated frames.
//!
//! Layout: `<root>/full/<ts>_<stream>_full_frame.jpg` and
//! `<root>/threats/<ts>_<stream>_<label>_crop.jpg`, where `<ts>` has
//! microsecond precision so filenames sort lexicographically by time.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Local;
use regex_lite::Regex;
use tracing::debug;

fn sanitize(value: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_-]+").unwrap());
    re.replace_all(value, "_").into_owned()
}

#[derive(Debug, Clone)]
pub struct Snapshotter {
    root: PathBuf,
}

impl Snapshotter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the full frame and the crop. Parent directories are created
    /// idempotently. Callers treat failures as log-only.
    pub async fn save(
        &self,
        stream_id: &str,
        label: &str,
        full_jpeg: &[u8],
        crop_jpeg: &[u8],
    ) -> std::io::Result<(PathBuf, PathBuf)> {
        let full_dir = self.root.join("full");
        let threat_dir = self.root.join("threats");
        tokio::fs::create_dir_all(&full_dir).await?;
        tokio::fs::create_dir_all(&threat_dir).await?;

        let ts = Local::now().format("%Y%m%d_%H%M%S_%6f").to_string();
        let stream = sanitize(stream_id);
        let label = sanitize(label);

        let full_path = full_dir.join(format!("{ts}_{stream}_full_frame.jpg"));
        let crop_path = threat_dir.join(format!("{ts}_{stream}_{label}_crop.jpg"));
        tokio::fs::write(&full_path, full_jpeg).await?;
        tokio::fs::write(&crop_path, crop_jpeg).await?;

        debug!(full = %full_path.display(), crop = %crop_path.display(), "snapshots written");
        Ok((full_path, crop_path))
    }
}
