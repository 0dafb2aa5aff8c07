//! Synthetic video backend.
//!
//! Produces generated frames for both camera and file origins so the
//! pipeline can run without a capture stack. Open handles are counted, which
//! lets callers verify that only one origin is ever held at a time.

use crate::source::backend::{FrameStream, VideoBackend};
use crate::source::types::{CameraConstraints, DeviceAccessError, Frame, VideoBlob};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Resolution used for file origins.
pub const FILE_FRAME_SIZE: (u32, u32) = (640, 480);

/// Default number of frames in a file origin (30 s at 10 fps).
pub const DEFAULT_FILE_FRAMES: u64 = 300;

/// Counts device handles currently held by streams of one backend.
#[derive(Debug, Clone, Default)]
pub struct DeviceHandles {
    open: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl DeviceHandles {
    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open handles seen.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> HandleGuard {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        HandleGuard {
            open: self.open.clone(),
        }
    }
}

/// Releases its handle count when dropped.
struct HandleGuard {
    open: Arc<AtomicUsize>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Lets a caller change whether the camera can be acquired.
#[derive(Debug, Clone, Default)]
pub struct CameraControl {
    failure: Arc<Mutex<Option<DeviceAccessError>>>,
}

impl CameraControl {
    pub fn fail_with(&self, error: DeviceAccessError) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(error);
        }
    }

    pub fn clear_failure(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }

    fn current(&self) -> Option<DeviceAccessError> {
        self.failure.lock().ok().and_then(|f| f.clone())
    }
}

/// A backend that synthesizes frames.
pub struct SyntheticBackend {
    handles: DeviceHandles,
    camera: CameraControl,
    file_frames: u64,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self {
            handles: DeviceHandles::default(),
            camera: CameraControl::default(),
            file_frames: DEFAULT_FILE_FRAMES,
        }
    }

    /// Make camera acquisition fail with `error` until cleared.
    pub fn failing_camera(self, error: DeviceAccessError) -> Self {
        self.camera.fail_with(error);
        self
    }

    /// Number of frames a file origin yields before it ends.
    pub fn with_file_frames(mut self, frames: u64) -> Self {
        self.file_frames = frames;
        self
    }

    pub fn handles(&self) -> DeviceHandles {
        self.handles.clone()
    }

    pub fn camera_control(&self) -> CameraControl {
        self.camera.clone()
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoBackend for SyntheticBackend {
    fn open_camera(
        &mut self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn FrameStream>, DeviceAccessError> {
        if let Some(error) = self.camera.current() {
            return Err(error);
        }
        if constraints.width == 0 || constraints.height == 0 {
            return Err(DeviceAccessError::ConstraintsUnsatisfiable);
        }
        Ok(Box::new(SyntheticStream::new(
            constraints.width,
            constraints.height,
            None,
            self.handles.acquire(),
        )))
    }

    fn open_file(&mut self, blob: &VideoBlob) -> Result<Box<dyn FrameStream>, String> {
        let metadata = std::fs::metadata(&blob.path)
            .map_err(|e| format!("Could not open {:?}: {e}", blob.path))?;
        if !metadata.is_file() {
            return Err(format!("{:?} is not a file", blob.path));
        }
        let (width, height) = FILE_FRAME_SIZE;
        Ok(Box::new(SyntheticStream::new(
            width,
            height,
            Some(self.file_frames),
            self.handles.acquire(),
        )))
    }
}

/// A generated stream; camera streams never end, file streams end after
/// `frame_limit` frames.
struct SyntheticStream {
    width: u32,
    height: u32,
    frame_limit: Option<u64>,
    next_sequence: u64,
    pixels: Arc<[u8]>,
    paused: bool,
    handle: Option<HandleGuard>,
}

impl SyntheticStream {
    fn new(width: u32, height: u32, frame_limit: Option<u64>, handle: HandleGuard) -> Self {
        let len = width as usize * height as usize * 3;
        let pixels: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        Self {
            width,
            height,
            frame_limit,
            next_sequence: 0,
            pixels: pixels.into(),
            paused: false,
            handle: Some(handle),
        }
    }
}

impl FrameStream for SyntheticStream {
    fn next_frame(&mut self) -> Option<Frame> {
        if self.paused || self.handle.is_none() {
            return None;
        }
        if let Some(limit) = self.frame_limit {
            if self.next_sequence >= limit {
                return None;
            }
        }
        let frame = Frame::new(
            self.width,
            self.height,
            self.next_sequence,
            self.pixels.clone(),
        );
        self.next_sequence += 1;
        Some(frame)
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn release(&mut self) {
        self.handle = None;
    }
}
