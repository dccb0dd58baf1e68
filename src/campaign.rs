//! Iterated capture campaign: shoot every camera, then persist the iteration.

use crate::config::{MulticapConfig, PersistencePolicy};
use crate::encode::PixelEncoder;
use crate::error::{MulticapError, PersistenceError, Result};
use crate::frame::FrameRecord;
use crate::session::{CaptureSession, ShotMode, ShotPlan};
use crate::storage::ImagePersistence;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Everything one campaign run needs besides the session itself
#[derive(Debug, Clone)]
pub struct CampaignPlan {
    pub iterations: u32,
    pub shots_per_camera: u32,
    pub mode: ShotMode,
    pub inter_shot_delay: Duration,
    pub between_camera_delay: Duration,
    pub one_shot_timeout: Duration,
    pub continuous_timeout: Duration,
    pub name_stem: String,
    pub output_dir: PathBuf,
    pub on_persistence_error: PersistencePolicy,
    pub save_metadata: bool,
}

impl From<&MulticapConfig> for CampaignPlan {
    fn from(config: &MulticapConfig) -> Self {
        let campaign = &config.campaign;
        Self {
            iterations: campaign.iterations,
            shots_per_camera: campaign.shots_per_camera,
            mode: ShotMode::from_continuous(campaign.continuous),
            inter_shot_delay: Duration::from_millis(campaign.inter_shot_delay_ms),
            between_camera_delay: Duration::from_millis(campaign.between_camera_delay_ms),
            one_shot_timeout: Duration::from_millis(config.capture.one_shot_timeout_ms),
            continuous_timeout: Duration::from_millis(config.capture.continuous_timeout_ms),
            name_stem: campaign.name_stem.clone(),
            output_dir: PathBuf::from(&config.storage.path),
            on_persistence_error: campaign.on_persistence_error,
            save_metadata: config.storage.save_metadata,
        }
    }
}

impl CampaignPlan {
    /// Filename prefix shared by every frame of `iteration`
    pub fn prefix(&self, iteration: u32) -> String {
        format!("{}{:04}", self.name_stem, iteration)
    }
}

/// Totals reported once a campaign finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignSummary {
    pub iterations_completed: u32,
    pub frames_captured: usize,
    pub frames_saved: usize,
    pub frames_skipped: usize,
}

/// Runs a [`CampaignPlan`] against an opened session
pub struct CampaignDriver {
    plan: CampaignPlan,
    persistence: ImagePersistence,
}

impl CampaignDriver {
    pub fn new(plan: CampaignPlan, persistence: ImagePersistence) -> Self {
        Self { plan, persistence }
    }

    /// Build the plan and the JPEG writer from configuration
    pub fn from_config(config: &MulticapConfig) -> Result<Self> {
        let encoder =
            PixelEncoder::new(config.storage.jpeg_quality, config.capture.channel_order)?;
        Ok(Self::new(
            CampaignPlan::from(config),
            ImagePersistence::new(encoder),
        ))
    }

    pub fn plan(&self) -> &CampaignPlan {
        &self.plan
    }

    /// Run every iteration, stopping at the first capture failure
    pub fn run(&self, session: &mut CaptureSession) -> Result<CampaignSummary> {
        if session.connected_count() == 0 {
            return Err(MulticapError::system(
                "Campaign requires an opened capture session",
            ));
        }

        std::fs::create_dir_all(&self.plan.output_dir).map_err(|source| {
            PersistenceError::CreateDirectory {
                path: self.plan.output_dir.clone(),
                source,
            }
        })?;

        let mut summary = CampaignSummary::default();

        for iteration in 0..self.plan.iterations {
            let prefix = self.plan.prefix(iteration);
            debug!("Starting iteration {} ({})", iteration, prefix);

            let frames = self.capture_iteration(session, &prefix)?;
            summary.frames_captured += frames.len();

            self.persist_iteration(&prefix, &frames, &mut summary)?;
            summary.iterations_completed += 1;
        }

        info!(
            "Campaign finished: {} iterations, {} frames captured, {} saved, {} skipped",
            summary.iterations_completed,
            summary.frames_captured,
            summary.frames_saved,
            summary.frames_skipped
        );
        Ok(summary)
    }

    fn capture_iteration(
        &self,
        session: &mut CaptureSession,
        prefix: &str,
    ) -> Result<Vec<FrameRecord>> {
        let mut frames = Vec::new();

        for slot in 0..session.connected_count() {
            if !self.plan.between_camera_delay.is_zero() {
                debug!(
                    "Delaying {} ms before next camera",
                    self.plan.between_camera_delay.as_millis()
                );
                std::thread::sleep(self.plan.between_camera_delay);
            }

            let shot = ShotPlan::new(slot, self.plan.shots_per_camera, prefix, self.plan.mode)
                .with_inter_shot_delay(self.plan.inter_shot_delay)
                .with_timeouts(self.plan.one_shot_timeout, self.plan.continuous_timeout);

            match session.shoot(&shot) {
                Ok(mut grabbed) => frames.append(&mut grabbed),
                Err(e) => {
                    error!("Capture from {} failed: {}", e.camera(), e);
                    return Err(e.into());
                }
            }
        }

        Ok(frames)
    }

    fn persist_iteration(
        &self,
        prefix: &str,
        frames: &[FrameRecord],
        summary: &mut CampaignSummary,
    ) -> Result<()> {
        let directory = self.plan.output_dir.as_path();
        let mut saved = Vec::with_capacity(frames.len());

        match self.plan.on_persistence_error {
            PersistencePolicy::Abort => {
                self.persistence.save_all(directory, frames)?;
                summary.frames_saved += frames.len();
                saved.extend(frames.iter().cloned());
            }
            PersistencePolicy::Skip => {
                for frame in frames {
                    match self.persistence.save_one(directory, frame) {
                        Ok(_) => {
                            summary.frames_saved += 1;
                            saved.push(frame.clone());
                        }
                        Err(e) => {
                            warn!("Skipping {}: {}", frame.basename, e);
                            summary.frames_skipped += 1;
                        }
                    }
                }
            }
        }

        if self.plan.save_metadata {
            if let Err(e) = self.persistence.write_manifest(directory, prefix, &saved) {
                match self.plan.on_persistence_error {
                    PersistencePolicy::Abort => return Err(e.into()),
                    PersistencePolicy::Skip => warn!("Skipping manifest for {}: {}", prefix, e),
                }
            }
        }

        Ok(())
    }
}
