//! Evidence snapshots — the accepted face region for each attendance event,
//! filed under the event's calendar date.

use chrono::NaiveDateTime;
use image::GrayImage;
use punchcard_core::FaceRegion;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("region dimensions do not form an image ({width}x{height})")]
    BadRegion { width: u32, height: u32 },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Snapshot store rooted at one directory; images land in
/// `by_date/<YYYY-MM-DD>/`.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save the accepted region as a PNG named after the identity and
    /// timestamp. Returns the written path.
    pub fn save(
        &self,
        identity: &str,
        region: &FaceRegion,
        timestamp: NaiveDateTime,
    ) -> Result<PathBuf, SnapshotError> {
        let image = GrayImage::from_raw(region.width, region.height, region.data.clone())
            .ok_or(SnapshotError::BadRegion {
                width: region.width,
                height: region.height,
            })?;

        let date_dir = self
            .dir
            .join("by_date")
            .join(timestamp.date().format("%Y-%m-%d").to_string());
        std::fs::create_dir_all(&date_dir)?;

        let path = date_dir.join(format!(
            "{identity}_{}.png",
            timestamp.format("%Y%m%d_%H%M%S")
        ));
        image.save(&path)?;

        tracing::debug!(identity, path = %path.display(), "evidence snapshot saved");
        Ok(path)
    }
}
