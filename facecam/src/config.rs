use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::encoder::DEFAULT_QUALITY;
use crate::pacer::INITIAL_CREDIT;
use crate::palette::{DEFAULT_SCHEME, DEFAULT_SIZE};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("initial credit must be at least 1, or no frame is ever sent")]
    ZeroCredit,

    #[error("interval must be at least 1 ms")]
    ZeroInterval,
}

/// Everything needed to start one streaming session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend address, `ws://` (or `wss://` with the `tls` feature).
    pub url: String,
    /// V4L2 device node.
    pub device: String,
    pub capture_width: u32,
    pub capture_height: u32,
    pub fps: u32,
    /// Size of the frames sent to the backend.
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 1 to 100.
    pub quality: u8,
    /// Pacing tick.
    pub interval: Duration,
    pub initial_credit: u32,
    pub palette_scheme: String,
    pub palette_size: usize,
    /// Write the roster as a self-refreshing HTML page here.
    pub html: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: "ws://localhost:9000".to_string(),
            device: "/dev/video0".to_string(),
            capture_width: 640,
            capture_height: 480,
            fps: 30,
            width: 400,
            height: 300,
            quality: DEFAULT_QUALITY,
            interval: Duration::from_millis(250),
            initial_credit: INITIAL_CREDIT,
            palette_scheme: DEFAULT_SCHEME.to_string(),
            palette_size: DEFAULT_SIZE,
            html: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_credit == 0 {
            return Err(ConfigError::ZeroCredit);
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}
