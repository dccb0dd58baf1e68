use crate::encode::PixelEncoder;
use crate::error::PersistenceError;
use crate::frame::FrameRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Writes frame records to disk as JPEG files
#[derive(Debug, Clone)]
pub struct ImagePersistence {
    encoder: PixelEncoder,
}

/// One frame entry of an iteration manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub basename: String,
    pub file: String,
    pub camera: String,
    pub slot: usize,
    pub shot_index: u32,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

/// Description of every frame captured during one iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationManifest {
    pub prefix: String,
    pub written_at: DateTime<Utc>,
    pub jpeg_quality: u8,
    pub frames: Vec<ManifestEntry>,
}

impl ImagePersistence {
    pub fn new(encoder: PixelEncoder) -> Self {
        Self { encoder }
    }

    /// Path a frame is written to inside `directory`
    pub fn output_path(directory: &Path, frame: &FrameRecord) -> PathBuf {
        directory.join(format!("{}.jpg", frame.basename))
    }

    /// Save every frame, in order
    pub fn save_all(
        &self,
        directory: &Path,
        frames: &[FrameRecord],
    ) -> Result<Vec<PathBuf>, PersistenceError> {
        self.save_range(directory, frames, 0, frames.len())
    }

    /// Save frames `start..end`; `end` is clamped to the number of frames
    pub fn save_range(
        &self,
        directory: &Path,
        frames: &[FrameRecord],
        start: usize,
        end: usize,
    ) -> Result<Vec<PathBuf>, PersistenceError> {
        let end = end.min(frames.len());
        let selected = frames.get(start..end).unwrap_or_default();

        selected
            .iter()
            .map(|frame| self.save_one(directory, frame))
            .collect()
    }

    /// Encode one frame into `<directory>/<basename>.jpg`.
    ///
    /// The file is only touched once encoding has succeeded, and a failed
    /// write removes it again.
    pub fn save_one(
        &self,
        directory: &Path,
        frame: &FrameRecord,
    ) -> Result<PathBuf, PersistenceError> {
        let path = Self::output_path(directory, frame);

        let jpeg = self
            .encoder
            .encode_buffer(&frame.pixels)
            .map_err(|source| PersistenceError::Encode {
                path: path.clone(),
                source,
            })?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| PersistenceError::Open {
                path: path.clone(),
                source,
            })?;

        if let Err(source) = write_file(file, &jpeg) {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to remove partial file {}: {}", path.display(), e);
            }
            return Err(PersistenceError::Write { path, source });
        }

        info!("Saved {}", path.display());
        Ok(path)
    }

    /// Write `<directory>/<prefix>.json` describing `frames`
    pub fn write_manifest(
        &self,
        directory: &Path,
        prefix: &str,
        frames: &[FrameRecord],
    ) -> Result<PathBuf, PersistenceError> {
        let path = directory.join(format!("{}.json", prefix));

        let manifest = IterationManifest {
            prefix: prefix.to_string(),
            written_at: Utc::now(),
            jpeg_quality: self.encoder.quality(),
            frames: frames
                .iter()
                .map(|frame| ManifestEntry {
                    basename: frame.basename.clone(),
                    file: format!("{}.jpg", frame.basename),
                    camera: frame.camera.clone(),
                    slot: frame.slot,
                    shot_index: frame.shot_index,
                    width: frame.pixels.width,
                    height: frame.pixels.height,
                    captured_at: frame.captured_at,
                })
                .collect(),
        };

        let json = serde_json::to_string_pretty(&manifest).map_err(|e| {
            PersistenceError::Manifest {
                path: path.clone(),
                details: format!("Failed to serialize manifest: {}", e),
            }
        })?;

        std::fs::write(&path, json).map_err(|e| PersistenceError::Manifest {
            path: path.clone(),
            details: format!("Failed to write manifest: {}", e),
        })?;

        debug!("Saved manifest to {}", path.display());
        Ok(path)
    }
}

fn write_file(file: File, bytes: &[u8]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}
