//! Frame-source and face-locator contracts.
//!
//! Frame acquisition and face localization are external collaborators: the
//! pipeline only depends on these traits, driven identically by a live
//! camera, a stored video, or an in-memory replay.

use crate::types::{FaceBox, GrayFrame};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;

// --- Named constants ---
const LOW_RES_WIDTH: u32 = 640;
const LOW_RES_HEIGHT: u32 = 480;
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("frame directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("failed to decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Pull-based frame provider. `Ok(None)` is end-of-stream.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<GrayFrame>, SourceError>;
}

/// Black-box face localization: zero or more axis-aligned regions per frame.
pub trait FaceLocator {
    fn locate(&self, frame: &GrayFrame) -> Vec<FaceBox>;
}

/// Locator for pre-cropped footage: the whole frame is one face region.
pub struct FullFrameLocator;

impl FaceLocator for FullFrameLocator {
    fn locate(&self, frame: &GrayFrame) -> Vec<FaceBox> {
        if frame.width == 0 || frame.height == 0 {
            return Vec::new();
        }
        vec![FaceBox {
            x: 0,
            y: 0,
            width: frame.width,
            height: frame.height,
        }]
    }
}

/// In-memory frame source for tests and replay.
pub struct MemoryFrameSource {
    frames: VecDeque<GrayFrame>,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<GrayFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameSource for MemoryFrameSource {
    fn next_frame(&mut self) -> Result<Option<GrayFrame>, SourceError> {
        Ok(self.frames.pop_front())
    }
}

/// Ordered directory of still frames, decoded to grayscale on demand.
///
/// Stands in for uploaded footage that has already been split into frames;
/// files are visited in lexicographic order.
#[derive(Debug)]
pub struct DirectoryFrameSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    warned_low_res: bool,
}

impl DirectoryFrameSource {
    pub fn open(dir: &Path) -> Result<Self, SourceError> {
        if !dir.is_dir() {
            return Err(SourceError::DirectoryNotFound(dir.to_path_buf()));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        tracing::debug!(dir = %dir.display(), frames = paths.len(), "opened frame directory");

        Ok(Self {
            paths,
            cursor: 0,
            warned_low_res: false,
        })
    }

    pub fn remaining(&self) -> usize {
        self.paths.len() - self.cursor
    }
}

impl FrameSource for DirectoryFrameSource {
    fn next_frame(&mut self) -> Result<Option<GrayFrame>, SourceError> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let sequence = self.cursor as u32;
        self.cursor += 1;

        let gray = image::open(path)
            .map_err(|source| SourceError::Decode {
                path: path.clone(),
                source,
            })?
            .to_luma8();

        let (width, height) = gray.dimensions();
        if !self.warned_low_res && (width < LOW_RES_WIDTH || height < LOW_RES_HEIGHT) {
            self.warned_low_res = true;
            tracing::warn!(
                width,
                height,
                "low-resolution frames may hurt face localization"
            );
        }

        Ok(Some(GrayFrame {
            data: gray.into_raw(),
            width,
            height,
            sequence,
        }))
    }
}
