//! Outputs a capture surface pushes to its host.

use serde::Serialize;

/// Sink for the state a hosting page renders.
///
/// Only the verification flag is mandatory; the remaining setters default
/// to no-ops so a host can subscribe to what it displays.
pub trait LivenessView {
    /// Whether the finished attempt included identity verification.
    fn set_detect_liveness_with_verify(&mut self, with_verify: bool);

    fn report_failure(&mut self, _reason: &str) {}

    fn set_liveness_icon(&mut self, _icon: &str) {}

    fn set_recognition_icon(&mut self, _icon: &str) {}

    fn set_liveness_text(&mut self, _text: &str) {}

    fn set_recognition_text(&mut self, _text: &str) {}
}

/// View that records everything pushed into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub detect_liveness_with_verify: Option<bool>,
    pub failures: Vec<String>,
    pub liveness_icon: Option<String>,
    pub recognition_icon: Option<String>,
    pub liveness_text: Option<String>,
    pub recognition_text: Option<String>,
}

impl ViewState {
    pub fn last_failure(&self) -> Option<&str> {
        self.failures.last().map(String::as_str)
    }
}

impl LivenessView for ViewState {
    fn set_detect_liveness_with_verify(&mut self, with_verify: bool) {
        self.detect_liveness_with_verify = Some(with_verify);
    }

    fn report_failure(&mut self, reason: &str) {
        tracing::debug!(reason, "failure reported to view");
        self.failures.push(reason.to_string());
    }

    fn set_liveness_icon(&mut self, icon: &str) {
        self.liveness_icon = Some(icon.to_string());
    }

    fn set_recognition_icon(&mut self, icon: &str) {
        self.recognition_icon = Some(icon.to_string());
    }

    fn set_liveness_text(&mut self, text: &str) {
        self.liveness_text = Some(text.to_string());
    }

    fn set_recognition_text(&mut self, text: &str) {
        self.recognition_text = Some(text.to_string());
    }
}
