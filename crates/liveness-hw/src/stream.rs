//! Media stream backed by a dedicated capture thread.
//!
//! The camera handle never leaves the worker thread. Callers talk to it
//! through a channel; stopping the stream closes the channel, the worker
//! drops the device and exits.

use crate::camera::{Camera, CameraError};
use crate::frame::Frame;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// A blocking frame source owned by the capture thread.
pub trait VideoSource: Send + 'static {
    /// Native (width, height) of produced frames.
    fn resolution(&self) -> (u32, u32);

    fn grab(&mut self) -> Result<Frame, CameraError>;
}

impl VideoSource for Camera {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn grab(&mut self) -> Result<Frame, CameraError> {
        self.capture_frame()
    }
}

/// Grants camera streams, like a browser's user-media prompt.
#[async_trait]
pub trait CameraAccess: Send + Sync {
    async fn request(&self) -> Result<MediaStream, CameraError>;
}

/// Opens a V4L2 device on request.
pub struct V4lCameraAccess {
    pub device_path: String,
    pub warmup_frames: usize,
}

impl V4lCameraAccess {
    pub fn new(device_path: impl Into<String>, warmup_frames: usize) -> Self {
        Self {
            device_path: device_path.into(),
            warmup_frames,
        }
    }
}

#[async_trait]
impl CameraAccess for V4lCameraAccess {
    async fn request(&self) -> Result<MediaStream, CameraError> {
        let path = self.device_path.clone();
        let warmup = self.warmup_frames;
        MediaStream::open(self.device_path.clone(), move || {
            let camera = Camera::open(&path)?;
            camera.warm_up(warmup);
            Ok(Box::new(camera) as Box<dyn VideoSource>)
        })
        .await
    }
}

enum StreamRequest {
    Grab {
        reply: oneshot::Sender<Result<Frame, CameraError>>,
    },
}

/// Live video stream with a single video track.
pub struct MediaStream {
    label: String,
    width: u32,
    height: u32,
    tx: Option<mpsc::Sender<StreamRequest>>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl MediaStream {
    /// Spawn the capture thread and open the source on it.
    ///
    /// Resolves once the source is open, or with the error that kept it
    /// from opening.
    pub async fn open<F>(label: impl Into<String>, opener: F) -> Result<Self, CameraError>
    where
        F: FnOnce() -> Result<Box<dyn VideoSource>, CameraError> + Send + 'static,
    {
        let label = label.into();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (tx, mut rx) = mpsc::channel::<StreamRequest>(4);

        let worker = std::thread::Builder::new()
            .name("liveness-capture".into())
            .spawn(move || {
                let mut source = match opener() {
                    Ok(source) => {
                        let _ = ready_tx.send(Ok(source.resolution()));
                        source
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                tracing::debug!("capture thread started");
                while let Some(req) = rx.blocking_recv() {
                    match req {
                        StreamRequest::Grab { reply } => {
                            let _ = reply.send(source.grab());
                        }
                    }
                }
                drop(source);
                tracing::debug!("capture thread exiting, device released");
            })
            .map_err(|e| CameraError::CaptureFailed(format!("failed to spawn capture thread: {e}")))?;

        let (width, height) = match ready_rx.await {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(CameraError::CaptureFailed("capture thread exited".into()));
            }
        };

        tracing::info!(label = %label, width, height, "media stream started");

        Ok(Self {
            label,
            width,
            height,
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Native resolution of the video track.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of tracks still delivering frames (0 or 1).
    pub fn active_tracks(&self) -> usize {
        usize::from(self.tx.is_some())
    }

    /// Grab the current frame.
    pub async fn grab(&self) -> Result<Frame, CameraError> {
        let tx = self.tx.as_ref().ok_or(CameraError::Stopped)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(StreamRequest::Grab { reply: reply_tx })
            .await
            .map_err(|_| CameraError::Stopped)?;
        reply_rx.await.map_err(|_| CameraError::Stopped)?
    }

    /// Stop every track and wait for the device to be released.
    ///
    /// Blocks the calling thread until the capture thread has finished any
    /// in-progress dequeue and closed the device, so the camera is free once
    /// this returns. That is normally well under one frame interval, but a
    /// wedged driver stalls the caller, async runtime worker included. Returns the number of tracks stopped; later calls stop nothing.
    pub fn stop(&mut self) -> usize {
        let Some(tx) = self.tx.take() else {
            return 0;
        };
        drop(tx);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::debug!(label = %self.label, "capture thread panicked during stop");
            }
        }
        tracing::info!(label = %self.label, "media stream stopped");
        1
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop();
    }
}
