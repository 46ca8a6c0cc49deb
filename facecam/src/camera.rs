use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use thiserror::Error;

//sudo apt install v4l-utils  (v4l2-ctl --list-formats-ext to check YU12 support)

/// Only planar YUV 4:2:0 is captured.
pub const CAPTURE_FORMAT: &str = "YU12";

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("width and height must not be zero")]
    ZeroSize,

    #[error("YU12 needs even dimensions, got {0}x{1}")]
    OddSize(u32, u32),

    #[error("only YU12 is supported, got {0}")]
    UnsupportedFormat(String),

    #[error("failed to open {device}: {source}")]
    Open {
        device: String,
        source: std::io::Error,
    },

    #[error("failed to start capture: {0}")]
    Start(String),

    #[error("capture failed: {0}")]
    Capture(#[from] std::io::Error),
}

/// Byte length of the Y, U and V planes of an I420 image.
pub fn i420_plane_sizes(width: u32, height: u32) -> [usize; 3] {
    let luma = width as usize * height as usize;
    let chroma = (width as usize / 2) * (height as usize / 2);
    [luma, chroma, chroma]
}

/// The most recent frame of a surface, in I420.
#[derive(Debug, Clone)]
pub struct Snapshot {
    width: u32,
    height: u32,
    data: Arc<Vec<u8>>,
}

impl Snapshot {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::new(data),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Split the buffer into Y, U and V planes; `None` if it is short.
    pub fn planes(&self) -> Option<[&[u8]; 3]> {
        let [y, u, v] = i420_plane_sizes(self.width, self.height);
        let y_plane = self.data.get(..y)?;
        let u_plane = self.data.get(y..y + u)?;
        let v_plane = self.data.get(y + u..y + u + v)?;
        Some([y_plane, u_plane, v_plane])
    }
}

/// A continuously updating picture that frames can be sampled from.
///
/// A surface that never produced a frame is "not ready"; callers treat
/// that as a steady state and check before every capture.
pub trait Surface {
    fn snapshot(&self) -> Option<Snapshot>;

    fn is_ready(&self) -> bool {
        self.snapshot().is_some()
    }
}

/// V4L2 webcam that keeps only its latest frame.
pub struct Camera {
    latest: Arc<RwLock<Option<Snapshot>>>,
    running: Arc<AtomicBool>,
}

impl Camera {
    /// Open `device` and start capturing in the background.
    ///
    /// Never fails: when the device is missing or refuses the format
    /// the camera stays not-ready for the rest of the session.
    pub fn start(device: &str, width: u32, height: u32, fps: u32) -> Camera {
        let camera = Camera {
            latest: Arc::new(RwLock::new(None)),
            running: Arc::new(AtomicBool::new(false)),
        };
        if let Err(err) = camera.open(device, CAPTURE_FORMAT, width, height, fps) {
            log::warn!("camera unavailable, no frames will be sent: {err}");
        }
        camera
    }

    fn open(
        &self,
        device: &str,
        format: &str,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<(), CameraError> {
        validate(format, width, height)?;

        let mut camera = rscam::new(device).map_err(|source| CameraError::Open {
            device: device.to_string(),
            source,
        })?;

        camera
            .start(&rscam::Config {
                interval: (1, fps.max(1)),
                resolution: (width, height),
                format: format.as_bytes(),
                ..Default::default()
            })
            .map_err(|err| CameraError::Start(format!("{:?}", err)))?;

        log::info!("camera {device} opened at {width}x{height}, {fps} fps");

        self.running.store(true, Ordering::Release);
        let latest = Arc::clone(&self.latest);
        let running = Arc::clone(&self.running);
        thread::spawn(move || {
            if let Err(err) = run_capture_loop(camera, &latest, &running) {
                log::warn!("camera stopped: {err}");
            }
            running.store(false, Ordering::Release);
        });

        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the capture thread. The last frame stays readable.
    pub fn close(&self) {
        self.running.store(false, Ordering::Release);
    }
}

impl Surface for Camera {
    fn snapshot(&self) -> Option<Snapshot> {
        self.latest.read().ok().and_then(|slot| slot.clone())
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.close();
    }
}

fn validate(format: &str, width: u32, height: u32) -> Result<(), CameraError> {
    if width == 0 || height == 0 {
        return Err(CameraError::ZeroSize);
    }
    if width % 2 != 0 || height % 2 != 0 {
        return Err(CameraError::OddSize(width, height));
    }
    if format != CAPTURE_FORMAT {
        return Err(CameraError::UnsupportedFormat(format.to_string()));
    }
    Ok(())
}

fn run_capture_loop(
    mut camera: rscam::Camera,
    latest: &RwLock<Option<Snapshot>>,
    running: &AtomicBool,
) -> Result<(), CameraError> {
    let mut ready = false;
    while running.load(Ordering::Acquire) {
        let frame = camera.capture()?;
        let (width, height) = frame.resolution;
        let snapshot = Snapshot::new(width, height, frame.to_vec());

        match latest.write() {
            Ok(mut slot) => {
                slot.replace(snapshot);
            }
            Err(_) => break,
        }
        if !ready {
            ready = true;
            log::info!("camera ready");
        }
    }

    camera
        .stop()
        .map_err(|err| CameraError::Start(format!("{:?}", err)))?;
    log::info!("camera closed");
    Ok(())
}
