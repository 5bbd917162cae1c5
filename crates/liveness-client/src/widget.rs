//! Capture surface delegating the whole capture to the vendor component.

use std::sync::Arc;

use liveness_core::{
    ActionKind, LivenessView, OperationMode, ReferenceImage, VerdictPresentation,
};

use crate::api::LivenessApi;
use crate::capture::{CaptureError, CaptureSession, CaptureState};
use crate::detector::{DetectorFactory, LivenessDetector, MountPoint};
use crate::result::ResultFetcher;
use crate::session::{SessionError, SessionInitiator};

/// Vendor-widget flow: authorize, let the detector run the session, fetch
/// the verdict.
///
/// The detector element is created on the first attempt and reused for
/// the lifetime of the surface. Dropping the surface detaches it.
pub struct WidgetCapture<V: LivenessView> {
    mode: OperationMode,
    reference: Option<ReferenceImage>,
    initiator: SessionInitiator,
    fetcher: ResultFetcher,
    factory: Arc<dyn DetectorFactory>,
    element: Option<(Box<dyn LivenessDetector>, MountPoint)>,
    has_visible_container: bool,
    session: CaptureSession,
    view: V,
}

impl<V: LivenessView> WidgetCapture<V> {
    pub fn new(
        api: Arc<dyn LivenessApi>,
        factory: Arc<dyn DetectorFactory>,
        mode: OperationMode,
        reference: Option<ReferenceImage>,
        view: V,
    ) -> Self {
        Self {
            mode,
            reference,
            initiator: SessionInitiator::new(api.clone()),
            fetcher: ResultFetcher::new(api),
            factory,
            element: None,
            has_visible_container: true,
            session: CaptureSession::default(),
            view,
        }
    }

    /// Without a visible container the element is attached at the root.
    pub fn without_visible_container(mut self) -> Self {
        self.has_visible_container = false;
        self
    }

    pub fn state(&self) -> CaptureState {
        self.session.state
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Mount point of the live detector element, if one exists.
    pub fn element_mount(&self) -> Option<MountPoint> {
        self.element.as_ref().map(|(_, mount)| *mount)
    }

    /// Run one liveness attempt. Only ever triggered by the user.
    ///
    /// Every failure is reported to the view and recorded on the session
    /// before it is returned. Dropping the future leaves the surface idle.
    pub async fn start_liveness(&mut self) -> Result<VerdictPresentation, CaptureError> {
        let attempt = self.session.begin();

        let auth = match self
            .initiator
            .initiate(self.mode, self.reference.as_ref())
            .await
        {
            Ok(auth) => auth,
            Err(e) => {
                tracing::warn!(error = %e, "liveness attempt aborted before capture");
                let message = match &e {
                    SessionError::Incomplete => "No session data",
                    other => {
                        self.view.report_failure(&other.to_string());
                        "Failed to fetch session token"
                    }
                };
                self.view.report_failure(message);
                attempt.abort(message);
                return Err(e.into());
            }
        };

        let action = ActionKind::for_reference(self.reference.is_some());
        let detector = Self::element(
            &mut self.element,
            self.factory.as_ref(),
            self.has_visible_container,
        );
        let outcome = detector.start(&auth.auth_token).await;

        match outcome {
            Ok(()) => {
                self.view
                    .set_detect_liveness_with_verify(action.includes_verification());
                match self.fetcher.fetch(action, &auth).await {
                    Ok(presentation) => {
                        presentation.apply(&mut self.view);
                        attempt.finish(None);
                        Ok(presentation)
                    }
                    Err(e) => {
                        let message = e.to_string();
                        self.view.report_failure(&message);
                        attempt.finish(Some(message));
                        Err(e.into())
                    }
                }
            }
            Err(rejection) => {
                let presentation = VerdictPresentation::from_rejection(&rejection, action);
                presentation.apply(&mut self.view);
                attempt.finish(Some(presentation.liveness.text.clone()));
                Err(rejection.into())
            }
        }
    }

    /// The reusable detector element, created and attached on first use.
    fn element<'a>(
        slot: &'a mut Option<(Box<dyn LivenessDetector>, MountPoint)>,
        factory: &dyn DetectorFactory,
        visible: bool,
    ) -> &'a mut Box<dyn LivenessDetector> {
        let (detector, _) = slot.get_or_insert_with(|| {
            let mount = if visible {
                MountPoint::Visible
            } else {
                MountPoint::Root
            };
            let mut detector = factory.create();
            detector.attach(mount);
            (detector, mount)
        });
        detector
    }

    /// Detach the detector element and forget it. Never fails.
    pub fn teardown(&mut self) {
        if let Some((mut detector, mount)) = self.element.take() {
            if let Err(e) = detector.detach(mount) {
                tracing::debug!(error = %e, "ignoring detector detach error");
            }
        }
    }
}

impl<V: LivenessView> Drop for WidgetCapture<V> {
    fn drop(&mut self) {
        self.teardown();
    }
}
