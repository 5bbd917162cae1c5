//! Capture surface that drives the camera itself.

use std::sync::Arc;

use liveness_core::{ActionKind, LivenessView, OperationMode, ReferenceImage, VerdictPresentation};
use liveness_hw::{CameraAccess, MediaStream, Snapshot};

use crate::api::LivenessApi;
use crate::capture::{CaptureError, CaptureSession};
use crate::result::{FetchError, ResultFetcher};
use crate::session::SessionInitiator;

const SNAPSHOT_FILE_NAME: &str = "capture.png";

/// Manual flow: take one still from the camera, upload it with the token
/// request, then fetch the verdict for that session.
pub struct ManualCapture<V: LivenessView> {
    mode: OperationMode,
    initiator: SessionInitiator,
    fetcher: ResultFetcher,
    stream: Option<MediaStream>,
    snapshot: Option<Snapshot>,
    session: CaptureSession,
    view: V,
}

impl<V: LivenessView> ManualCapture<V> {
    pub fn new(api: Arc<dyn LivenessApi>, mode: OperationMode, view: V) -> Self {
        Self {
            mode,
            initiator: SessionInitiator::new(api.clone()),
            fetcher: ResultFetcher::new(api),
            stream: None,
            snapshot: None,
            session: CaptureSession::default(),
            view,
        }
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Active tracks of the preview stream.
    pub fn active_tracks(&self) -> usize {
        self.stream.as_ref().map_or(0, MediaStream::active_tracks)
    }

    /// "Start liveness" is offered only with a snapshot and no attempt running.
    pub fn can_start(&self) -> bool {
        self.snapshot.is_some() && !self.session.capturing
    }

    /// Request the camera and bind it as the preview stream.
    ///
    /// On denial the surface stays unusable until mounted again.
    pub async fn mount(&mut self, access: &dyn CameraAccess) -> Result<(), CaptureError> {
        self.unmount();
        match access.request().await {
            Ok(stream) => {
                let (width, height) = stream.resolution();
                tracing::info!(label = stream.label(), width, height, "camera preview bound");
                self.stream = Some(stream);
                self.session.error.clear();
                Ok(())
            }
            Err(e) => {
                let err = CaptureError::CameraAccess(e);
                let message = err.to_string();
                tracing::warn!(error = %message, "camera access failed");
                self.session.error = message.clone();
                self.view.report_failure(&message);
                Err(err)
            }
        }
    }

    /// Rasterize the current frame into the snapshot, replacing any previous one.
    pub async fn capture_frame(&mut self) -> Result<&Snapshot, CaptureError> {
        let stream = self.stream.as_ref().ok_or(CaptureError::CameraUnavailable)?;
        let frame = stream
            .grab()
            .await
            .map_err(|e| CaptureError::Frame(e.to_string()))?;
        let snapshot = frame.snapshot()?;
        tracing::debug!(
            width = snapshot.width,
            height = snapshot.height,
            bytes = snapshot.png.len(),
            "snapshot captured"
        );
        Ok(self.snapshot.insert(snapshot))
    }

    /// Upload the snapshot and fetch the verdict for the resulting session.
    ///
    /// Dropping the future leaves the surface ready for another attempt.
    pub async fn start_liveness(&mut self) -> Result<VerdictPresentation, CaptureError> {
        let Some(snapshot) = &self.snapshot else {
            let err = CaptureError::NoSnapshot;
            self.session.error = err.to_string();
            return Err(err);
        };

        let reference = ReferenceImage::png(SNAPSHOT_FILE_NAME, snapshot.png.clone());
        let attempt = self.session.begin();

        let auth = match self.initiator.initiate(self.mode, Some(&reference)).await {
            Ok(auth) => auth,
            Err(e) => {
                self.view.report_failure(&e.to_string());
                let message = "Failed to get session data";
                self.view.report_failure(message);
                attempt.abort(message);
                return Err(e.into());
            }
        };

        let action = ActionKind::for_reference(true);
        match self.fetcher.fetch(action, &auth).await {
            Ok(presentation) => {
                presentation.apply(&mut self.view);
                self.view
                    .set_detect_liveness_with_verify(action.includes_verification());
                attempt.finish(None);
                Ok(presentation)
            }
            Err(e) => {
                let message = match &e {
                    FetchError::Invalid(invalid) => invalid.to_string(),
                    other => format!("Liveness session failed: {other}"),
                };
                self.view.report_failure(&message);
                attempt.finish(Some(message));
                Err(e.into())
            }
        }
    }

    /// Stop the preview stream, releasing the camera. Returns the tracks stopped.
    pub fn unmount(&mut self) -> usize {
        self.stream.take().map_or(0, |mut stream| stream.stop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureState;
    use crate::session::tests::FakeApi;
    use async_trait::async_trait;
    use liveness_core::types::SessionResults;
    use liveness_core::{Attempt, AttemptResult, SessionResult, VerifyResult, ViewState};
    use liveness_hw::camera::CameraError;
    use liveness_hw::{Frame, VideoSource};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct FakeCamera {
        released: Arc<AtomicUsize>,
        shade: u8,
    }

    impl VideoSource for FakeCamera {
        fn resolution(&self) -> (u32, u32) {
            (32, 24)
        }

        fn grab(&mut self) -> Result<Frame, CameraError> {
            self.shade = self.shade.wrapping_add(40);
            Ok(Frame {
                data: vec![self.shade; 32 * 24 * 3],
                width: 32,
                height: 24,
                timestamp: std::time::Instant::now(),
                sequence: 0,
            })
        }
    }

    impl Drop for FakeCamera {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeAccess {
        released: Arc<AtomicUsize>,
        deny: bool,
    }

    #[async_trait]
    impl CameraAccess for FakeAccess {
        async fn request(&self) -> Result<MediaStream, CameraError> {
            if self.deny {
                return Err(CameraError::AccessDenied("/dev/video0".into()));
            }
            let released = self.released.clone();
            MediaStream::open("fake", move || {
                Ok(Box::new(FakeCamera { released, shade: 0 }) as Box<dyn VideoSource>)
            })
            .await
        }
    }

    fn verified(is_identical: bool) -> SessionResult {
        SessionResult {
            results: SessionResults {
                attempts: vec![Attempt {
                    result: Some(AttemptResult {
                        liveness_decision: "spoofface".into(),
                        verify_result: Some(VerifyResult { is_identical }),
                    }),
                }],
            },
        }
    }

    #[tokio::test]
    async fn test_start_without_snapshot_makes_no_request() {
        let api = Arc::new(FakeApi::authorized());
        let mut manual = ManualCapture::new(api.clone(), OperationMode::Passive, ViewState::default());
        manual.mount(&FakeAccess::default()).await.unwrap();

        assert!(!manual.can_start());
        let err = manual.start_liveness().await.unwrap_err();
        assert!(matches!(err, CaptureError::NoSnapshot));
        assert_eq!(manual.session().error, "Please capture an image first.");
        assert_eq!(api.token_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.result_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_capture_keeps_one_snapshot_at_native_size() {
        let api = Arc::new(FakeApi::authorized());
        let mut manual = ManualCapture::new(api, OperationMode::Passive, ViewState::default());
        manual.mount(&FakeAccess::default()).await.unwrap();

        let first = manual.capture_frame().await.unwrap().png.clone();
        let second = manual.capture_frame().await.unwrap();
        assert_eq!((second.width, second.height), (32, 24));
        assert_ne!(first, second.png);
        assert!(manual.can_start());
    }

    #[tokio::test]
    async fn test_full_attempt_uploads_snapshot_and_presents() {
        let api = Arc::new(FakeApi::authorized());
        api.set_result(Ok(verified(true)));
        let mut manual =
            ManualCapture::new(api.clone(), OperationMode::PassiveActive, ViewState::default());
        manual.mount(&FakeAccess::default()).await.unwrap();
        manual.capture_frame().await.unwrap();

        let p = manual.start_liveness().await.unwrap();
        assert_eq!(p.liveness.text, "Spoof");
        assert_eq!(
            api.last_reference.lock().unwrap().as_deref(),
            Some("capture.png")
        );
        assert_eq!(
            *api.last_action.lock().unwrap(),
            Some(ActionKind::DetectLivenessWithVerify)
        );

        let view = manual.view();
        assert_eq!(view.detect_liveness_with_verify, Some(true));
        assert_eq!(view.recognition_text.as_deref(), Some("Same Person"));
        assert!(manual.session().completed);
        assert_eq!(manual.session().state, CaptureState::Completed);
        assert!(manual.session().error.is_empty());
    }

    #[tokio::test]
    async fn test_token_failure_skips_result_fetch() {
        let api = Arc::new(FakeApi::with_token(Err("denied".into())));
        let mut manual = ManualCapture::new(api.clone(), OperationMode::Passive, ViewState::default());
        manual.mount(&FakeAccess::default()).await.unwrap();
        manual.capture_frame().await.unwrap();

        assert!(manual.start_liveness().await.is_err());
        assert_eq!(api.result_calls.load(Ordering::SeqCst), 0);
        assert_eq!(manual.session().error, "Failed to get session data");
        assert_eq!(manual.view().last_failure(), Some("Failed to get session data"));
        assert!(!manual.session().capturing);
    }

    #[tokio::test]
    async fn test_validation_error_is_reported_verbatim() {
        let api = Arc::new(FakeApi::authorized());
        api.set_result(Ok(SessionResult::default()));
        let mut manual = ManualCapture::new(api, OperationMode::Passive, ViewState::default());
        manual.mount(&FakeAccess::default()).await.unwrap();
        manual.capture_frame().await.unwrap();

        assert!(manual.start_liveness().await.is_err());
        assert_eq!(
            manual.session().error,
            "Liveness session incomplete: No attempts found in results"
        );
        assert_eq!(manual.view().liveness_text, None);
    }

    #[tokio::test]
    async fn test_camera_denied() {
        let api = Arc::new(FakeApi::authorized());
        let mut manual = ManualCapture::new(api, OperationMode::Passive, ViewState::default());
        let access = FakeAccess {
            deny: true,
            ..FakeAccess::default()
        };

        let err = manual.mount(&access).await.unwrap_err();
        assert!(matches!(err, CaptureError::CameraAccess(_)));
        assert!(manual
            .session()
            .error
            .starts_with("Could not access camera: "));
        assert!(matches!(
            manual.capture_frame().await,
            Err(CaptureError::CameraUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_unmount_releases_camera_once() {
        let api = Arc::new(FakeApi::authorized());
        let access = FakeAccess::default();
        let mut manual = ManualCapture::new(api, OperationMode::Passive, ViewState::default());

        manual.mount(&access).await.unwrap();
        assert_eq!(manual.active_tracks(), 1);
        assert_eq!(manual.unmount(), 1);
        assert_eq!(manual.active_tracks(), 0);
        assert_eq!(manual.unmount(), 0);
        assert_eq!(access.released.load(Ordering::SeqCst), 1);

        // Remount acquires a fresh stream; dropping the surface releases it.
        manual.mount(&access).await.unwrap();
        drop(manual);
        assert_eq!(access.released.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_attempt_can_be_retried() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(FakeApi {
            gate: Some(gate.clone()),
            ..FakeApi::authorized()
        });
        api.set_result(Ok(verified(false)));
        let mut manual = ManualCapture::new(api.clone(), OperationMode::Passive, ViewState::default());
        manual.mount(&FakeAccess::default()).await.unwrap();
        manual.capture_frame().await.unwrap();

        let cancelled =
            tokio::time::timeout(Duration::from_millis(50), manual.start_liveness()).await;
        assert!(cancelled.is_err());
        assert!(!manual.session().capturing);
        assert!(manual.can_start());
        manual.capture_frame().await.unwrap();

        gate.notify_one();
        let p = manual.start_liveness().await.unwrap();
        assert_eq!(p.recognition.unwrap().text, "Not the same person");
        assert_eq!(api.token_calls.load(Ordering::SeqCst), 2);
        assert!(manual.session().completed);
    }
}
