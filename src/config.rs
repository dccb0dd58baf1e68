use crate::camera::TestPattern;
use crate::error::MulticapError;
use crate::frame::{ChannelOrder, PixelFormat};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MulticapConfig {
    pub campaign: CampaignConfig,
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CampaignConfig {
    /// Number of cameras to open (1 or 2)
    #[serde(default = "default_cameras")]
    pub cameras: u32,

    /// Frames shot from each camera per iteration (1-10)
    #[serde(default = "default_shots_per_camera")]
    pub shots_per_camera: u32,

    /// Number of iterations (1-1000)
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Use buffered free-running acquisition instead of one grab per shot
    #[serde(default = "default_continuous")]
    pub continuous: bool,

    /// Delay between shots of one camera in milliseconds (0-1000)
    #[serde(default)]
    pub inter_shot_delay_ms: u64,

    /// Delay before shooting each camera in milliseconds (0-10000)
    #[serde(default)]
    pub between_camera_delay_ms: u64,

    /// Leading part of every iteration prefix, e.g. "test" -> "test0000"
    #[serde(default = "default_name_stem")]
    pub name_stem: String,

    /// What to do when a frame cannot be written
    #[serde(default)]
    pub on_persistence_error: PersistencePolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Timeout for a single triggered grab
    #[serde(default = "default_one_shot_timeout_ms")]
    pub one_shot_timeout_ms: u64,

    /// Timeout for retrieving one buffered frame in continuous mode
    #[serde(default = "default_continuous_timeout_ms")]
    pub continuous_timeout_ms: u64,

    /// Channel order of converted frames and of the JPEG encoder input
    #[serde(default)]
    pub channel_order: ChannelOrder,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// Directory receiving the JPEG files
    #[serde(default = "default_storage_path")]
    pub path: String,

    /// JPEG quality (0-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Write a JSON manifest per iteration
    #[serde(default)]
    pub save_metadata: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SimulatorConfig {
    #[serde(default = "default_simulated_cameras")]
    pub cameras: Vec<SimulatedCameraConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SimulatedCameraConfig {
    /// User-defined device name; empty names get a synthesized identity
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_sim_width")]
    pub width: u32,

    #[serde(default = "default_sim_height")]
    pub height: u32,

    #[serde(default = "default_sim_pixel_format")]
    pub pixel_format: PixelFormat,

    /// Extra bytes at the end of every sensor row
    #[serde(default)]
    pub row_padding: usize,

    #[serde(default = "default_sim_pattern")]
    pub pattern: TestPattern,
}

/// Campaign response to a frame that could not be persisted
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PersistencePolicy {
    /// Stop the campaign at the first failure
    #[default]
    Abort,
    /// Log the failure and continue with the next frame
    Skip,
}

impl MulticapConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let defaults = Config::try_from(&MulticapConfig::default())?;

        let settings = Config::builder()
            // Start with default values
            .add_source(defaults)
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables, e.g. MULTICAP__STORAGE__PATH
            .add_source(
                Environment::with_prefix("MULTICAP")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: MulticapConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let campaign = &self.campaign;

        check_range("campaign.cameras", campaign.cameras as u64, 1, 2)?;
        check_range(
            "campaign.shots_per_camera",
            campaign.shots_per_camera as u64,
            1,
            10,
        )?;
        check_range("campaign.iterations", campaign.iterations as u64, 1, 1000)?;
        check_range(
            "campaign.inter_shot_delay_ms",
            campaign.inter_shot_delay_ms,
            0,
            1000,
        )?;
        check_range(
            "campaign.between_camera_delay_ms",
            campaign.between_camera_delay_ms,
            0,
            10000,
        )?;

        if campaign.name_stem.is_empty() {
            return Err(ConfigError::Message(
                "Campaign name_stem must not be empty".to_string(),
            ));
        }

        if self.capture.one_shot_timeout_ms == 0 || self.capture.continuous_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Capture timeouts must be greater than 0".to_string(),
            ));
        }

        if self.storage.path.is_empty() {
            return Err(ConfigError::Message(
                "Storage path must not be empty".to_string(),
            ));
        }

        check_range(
            "storage.jpeg_quality",
            self.storage.jpeg_quality as u64,
            0,
            100,
        )?;

        for (i, camera) in self.simulator.cameras.iter().enumerate() {
            if camera.width == 0 || camera.height == 0 {
                return Err(ConfigError::Message(format!(
                    "Simulated camera {} resolution must be greater than 0",
                    i
                )));
            }
        }

        Ok(())
    }
}

impl MulticapConfig {
    /// Consume the configuration if it passes [`MulticapConfig::validate`]
    pub fn validated(self) -> crate::error::Result<Self> {
        self.validate().map_err(|e| MulticapError::invalid_configuration(e.to_string()))?;
        Ok(self)
    }
}

fn check_range(name: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Message(format!(
            "{} must be within {}..={} (got {})",
            name, min, max, value
        )));
    }
    Ok(())
}

impl Default for MulticapConfig {
    fn default() -> Self {
        Self {
            campaign: CampaignConfig {
                cameras: default_cameras(),
                shots_per_camera: default_shots_per_camera(),
                iterations: default_iterations(),
                continuous: default_continuous(),
                inter_shot_delay_ms: 0,
                between_camera_delay_ms: 0,
                name_stem: default_name_stem(),
                on_persistence_error: PersistencePolicy::default(),
            },
            capture: CaptureConfig {
                one_shot_timeout_ms: default_one_shot_timeout_ms(),
                continuous_timeout_ms: default_continuous_timeout_ms(),
                channel_order: ChannelOrder::default(),
            },
            storage: StorageConfig {
                path: default_storage_path(),
                jpeg_quality: default_jpeg_quality(),
                save_metadata: false,
            },
            simulator: SimulatorConfig {
                cameras: default_simulated_cameras(),
            },
        }
    }
}

// Default value functions
fn default_cameras() -> u32 {
    2
}
fn default_shots_per_camera() -> u32 {
    3
}
fn default_iterations() -> u32 {
    10
}
fn default_continuous() -> bool {
    true
}
fn default_name_stem() -> String {
    "test".to_string()
}

fn default_one_shot_timeout_ms() -> u64 {
    1000
}
fn default_continuous_timeout_ms() -> u64 {
    5000
}

fn default_storage_path() -> String {
    "/tmp".to_string()
}
fn default_jpeg_quality() -> u8 {
    85
}

fn default_sim_width() -> u32 {
    640
}
fn default_sim_height() -> u32 {
    480
}
fn default_sim_pixel_format() -> PixelFormat {
    PixelFormat::BayerRg8
}
fn default_sim_pattern() -> TestPattern {
    TestPattern::ColorBars
}
fn default_simulated_cameras() -> Vec<SimulatedCameraConfig> {
    ["upper", "lower"]
        .into_iter()
        .map(|name| SimulatedCameraConfig {
            name: name.to_string(),
            width: default_sim_width(),
            height: default_sim_height(),
            pixel_format: default_sim_pixel_format(),
            row_padding: 0,
            pattern: default_sim_pattern(),
        })
        .collect()
}
