//! State shared by both capture surfaces.

use liveness_core::LivenessDetectionError;
use liveness_hw::camera::CameraError;
use liveness_hw::frame::FrameError;
use thiserror::Error;

use crate::result::FetchError;
use crate::session::SessionError;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Please capture an image first.")]
    NoSnapshot,
    #[error("Could not access camera: {0}")]
    CameraAccess(CameraError),
    #[error("camera is not available")]
    CameraUnavailable,
    #[error("failed to capture frame: {0}")]
    Frame(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Detection(#[from] LivenessDetectionError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl From<FrameError> for CaptureError {
    fn from(e: FrameError) -> Self {
        CaptureError::Frame(e.to_string())
    }
}

/// Where a surface is in its current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Capturing,
    Completed,
    Failed,
}

/// Per-attempt flags a host renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSession {
    pub state: CaptureState,
    pub capturing: bool,
    pub completed: bool,
    /// Last user-visible error; empty when none.
    pub error: String,
}

impl CaptureSession {
    /// Reset for a new attempt and mark it capturing.
    ///
    /// The session stays capturing only while the returned [`Attempt`] lives.
    pub(crate) fn begin(&mut self) -> Attempt<'_> {
        *self = Self {
            state: CaptureState::Capturing,
            capturing: true,
            ..Self::default()
        };
        Attempt { session: self }
    }
}

/// A running attempt.
///
/// Dropped without an outcome (the caller cancelled the future) it puts the
/// session back to idle, so the next attempt can start.
pub(crate) struct Attempt<'a> {
    session: &'a mut CaptureSession,
}

impl Attempt<'_> {
    /// Abort before the attempt produced anything.
    pub(crate) fn abort(self, error: impl Into<String>) {
        self.session.state = CaptureState::Idle;
        self.session.capturing = false;
        self.session.error = error.into();
    }

    /// The attempt ran to an outcome, successful or not.
    pub(crate) fn finish(self, error: Option<String>) {
        self.session.state = if error.is_some() {
            CaptureState::Failed
        } else {
            CaptureState::Completed
        };
        self.session.capturing = false;
        self.session.completed = true;
        self.session.error = error.unwrap_or_default();
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if self.session.capturing {
            tracing::debug!("liveness attempt dropped before an outcome");
            self.session.state = CaptureState::Idle;
            self.session.capturing = false;
        }
    }
}
