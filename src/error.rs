use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MulticapError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {details}")]
    InvalidConfiguration { details: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("System error: {message}")]
    System { message: String },
}

impl MulticapError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn invalid_configuration<S: Into<String>>(details: S) -> Self {
        Self::InvalidConfiguration {
            details: details.into(),
        }
    }
}

/// A failure reported by the camera transport or a device handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{description}")]
pub struct DeviceFault {
    pub description: String,
}

impl DeviceFault {
    pub fn new<S: Into<String>>(description: S) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// Errors raised while opening or closing a capture session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No cameras detected")]
    NoDevicesFound,

    #[error("Expected {expected} cameras but got {found}")]
    DeviceCountMismatch { expected: usize, found: usize },

    #[error("Failed to open camera device: {description}")]
    DeviceOpen { description: String },

    #[error("Unsupported camera count {requested} (must be 1 or 2)")]
    InvalidCameraCount { requested: usize },
}

/// Errors raised while acquiring frames from an opened camera
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("{camera} camera timed out")]
    GrabTimeout { camera: String },

    #[error("Error capturing photos from {camera}: {description}")]
    Device { camera: String, description: String },
}

impl CaptureError {
    /// Identity of the camera the failure refers to
    pub fn camera(&self) -> &str {
        match self {
            CaptureError::GrabTimeout { camera } | CaptureError::Device { camera, .. } => camera,
        }
    }
}

/// Errors raised by the pixel encoder adapter or the underlying image encoder
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("Invalid image geometry: {details}")]
    InvalidGeometry { details: String },

    #[error("Pixel buffer too short: expected at least {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("JPEG quality {quality} is outside 0..=100")]
    InvalidQuality { quality: u8 },

    #[error("Encoder failure: {details}")]
    Encoder { details: String },

    #[error("Encoder output failure: {0}")]
    Output(#[from] std::io::Error),
}

/// Errors raised while writing frames to storage
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Error creating output directory {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error opening {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error encoding {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: EncodingError,
    },

    #[error("Error writing manifest {}: {details}", path.display())]
    Manifest { path: PathBuf, details: String },
}

impl PersistenceError {
    pub fn path(&self) -> &PathBuf {
        match self {
            PersistenceError::CreateDirectory { path, .. }
            | PersistenceError::Open { path, .. }
            | PersistenceError::Write { path, .. }
            | PersistenceError::Encode { path, .. }
            | PersistenceError::Manifest { path, .. } => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, MulticapError>;
