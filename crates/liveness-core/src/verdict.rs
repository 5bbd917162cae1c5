//! Projection of session records into user-facing icon/text pairs.

use crate::types::{ActionKind, AttemptResult, LivenessDetectionError, SessionResult};
use crate::view::LivenessView;
use thiserror::Error;

/// The only decision value that counts as a live subject.
pub const REAL_FACE: &str = "realface";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResultError {
    #[error("Liveness session incomplete: No attempts found in results")]
    NoAttempts,
    #[error("Liveness session incomplete: No result in attempt")]
    NoResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Checkmark,
    Dismiss,
}

impl Icon {
    /// Asset name the hosting page renders.
    pub fn asset(&self) -> &'static str {
        match self {
            Icon::Checkmark => "CheckmarkCircle.png",
            Icon::Dismiss => "DismissCircle.png",
        }
    }

    fn from_condition(ok: bool) -> Self {
        if ok {
            Icon::Checkmark
        } else {
            Icon::Dismiss
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub icon: Icon,
    pub text: String,
}

impl Verdict {
    fn new(icon: Icon, text: impl Into<String>) -> Self {
        Self {
            icon,
            text: text.into(),
        }
    }
}

/// Liveness verdict plus, when verification ran, the recognition verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictPresentation {
    pub liveness: Verdict,
    pub recognition: Option<Verdict>,
}

impl VerdictPresentation {
    /// Validate a decision record and project its first attempt.
    ///
    /// Validation stops at the first missing piece. A missing verification
    /// sub-record is not an error: the recognition verdict is simply absent.
    pub fn from_session_result(
        result: &SessionResult,
        action: ActionKind,
    ) -> Result<Self, ResultError> {
        let attempt = result.first_attempt().ok_or(ResultError::NoAttempts)?;
        let attempt_result = attempt.result.as_ref().ok_or(ResultError::NoResult)?;
        Ok(Self::from_attempt(attempt_result, action))
    }

    pub fn from_attempt(result: &AttemptResult, action: ActionKind) -> Self {
        let real = result.liveness_decision == REAL_FACE;
        let liveness = Verdict::new(
            Icon::from_condition(real),
            if real { "Real Person" } else { "Spoof" },
        );

        let recognition = if action.includes_verification() {
            result.verify_result.map(|verify| {
                Verdict::new(
                    Icon::from_condition(verify.is_identical),
                    if verify.is_identical {
                        "Same Person"
                    } else {
                        "Not the same person"
                    },
                )
            })
        } else {
            None
        };

        Self {
            liveness,
            recognition,
        }
    }

    /// Presentation for a session the vendor component rejected.
    pub fn from_rejection(error: &LivenessDetectionError, action: ActionKind) -> Self {
        let liveness = Verdict::new(
            Icon::Dismiss,
            non_empty(error.liveness_error.as_deref()).unwrap_or("Liveness error"),
        );
        let recognition = action.includes_verification().then(|| {
            Verdict::new(
                Icon::Dismiss,
                non_empty(error.recognition_error.as_deref()).unwrap_or("Recognition error"),
            )
        });
        Self {
            liveness,
            recognition,
        }
    }

    /// Push the presentation into a view.
    pub fn apply(&self, view: &mut dyn LivenessView) {
        view.set_liveness_icon(self.liveness.icon.asset());
        view.set_liveness_text(&self.liveness.text);
        if let Some(recognition) = &self.recognition {
            view.set_recognition_icon(recognition.icon.asset());
            view.set_recognition_text(&recognition.text);
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}
