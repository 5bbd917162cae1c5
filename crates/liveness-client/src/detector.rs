//! Vendor capture component, modelled as an attachable detector.
//!
//! The vendor drives the camera and talks to the liveness service on its
//! own; all the client sees is `start(token)` resolving or rejecting.

use async_trait::async_trait;
use liveness_core::LivenessDetectionError;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Container a detector element is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountPoint {
    /// The surface's visible container; the user sees the capture UI.
    Visible,
    /// Fallback at the document root, not shown to the user.
    Root,
}

#[derive(Error, Debug)]
pub enum DetachError {
    #[error("detector is not attached to {0:?}")]
    NotAttached(MountPoint),
}

/// A vendor-provided capture element.
#[async_trait]
pub trait LivenessDetector: Send {
    fn attach(&mut self, mount: MountPoint);

    fn detach(&mut self, mount: MountPoint) -> Result<(), DetachError>;

    /// Run one capture session authorized by `auth_token`.
    async fn start(&mut self, auth_token: &str) -> Result<(), LivenessDetectionError>;
}

/// Creates detector elements for a capture surface.
pub trait DetectorFactory: Send + Sync {
    fn create(&self) -> Box<dyn LivenessDetector>;
}

/// Environment variable carrying the session token to the helper.
pub const AUTH_TOKEN_ENV: &str = "LIVENESS_AUTH_TOKEN";

/// Runs an external vendor helper program per session.
///
/// The helper receives the token in [`AUTH_TOKEN_ENV`]. Exit status 0
/// resolves the session; any other status rejects it, with an optional
/// `{"livenessError": ..., "recognitionError": ...}` object on stdout.
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
    mount: Option<MountPoint>,
}

impl CommandDetector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            mount: None,
        }
    }

    pub fn mount(&self) -> Option<MountPoint> {
        self.mount
    }
}

#[async_trait]
impl LivenessDetector for CommandDetector {
    fn attach(&mut self, mount: MountPoint) {
        tracing::debug!(program = %self.program, ?mount, "detector attached");
        self.mount = Some(mount);
    }

    fn detach(&mut self, mount: MountPoint) -> Result<(), DetachError> {
        if self.mount != Some(mount) {
            return Err(DetachError::NotAttached(mount));
        }
        self.mount = None;
        tracing::debug!(program = %self.program, ?mount, "detector detached");
        Ok(())
    }

    async fn start(&mut self, auth_token: &str) -> Result<(), LivenessDetectionError> {
        let visible = self.mount == Some(MountPoint::Visible);
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env(AUTH_TOKEN_ENV, auth_token)
            .stdout(Stdio::piped())
            .kill_on_drop(true);
        if visible {
            command.stdin(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdin(Stdio::null()).stderr(Stdio::null());
        }

        tracing::info!(program = %self.program, visible, "starting vendor capture session");
        let child = command.spawn().map_err(|e| {
            LivenessDetectionError::liveness(format!("failed to launch {}: {e}", self.program))
        })?;
        let output = child.wait_with_output().await.map_err(|e| {
            LivenessDetectionError::liveness(format!("vendor capture session lost: {e}"))
        })?;

        if output.status.success() {
            tracing::info!("vendor capture session completed");
            return Ok(());
        }

        let rejection = parse_rejection(&output.stdout);
        tracing::warn!(
            status = ?output.status.code(),
            liveness_error = rejection.liveness_error.as_deref(),
            recognition_error = rejection.recognition_error.as_deref(),
            "vendor capture session rejected"
        );
        Err(rejection)
    }
}

/// Rejection details from helper stdout; anything unparseable carries none.
fn parse_rejection(stdout: &[u8]) -> LivenessDetectionError {
    let text = String::from_utf8_lossy(stdout);
    serde_json::from_str(text.trim()).unwrap_or_default()
}

/// Builds a [`CommandDetector`] from a configured command line.
pub struct CommandDetectorFactory {
    program: String,
    args: Vec<String>,
}

impl CommandDetectorFactory {
    /// `command` is the program followed by its arguments. Returns `None` when empty.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl DetectorFactory for CommandDetectorFactory {
    fn create(&self) -> Box<dyn LivenessDetector> {
        Box::new(CommandDetector::new(self.program.clone(), self.args.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandDetector {
        let mut detector = CommandDetector::new("sh", vec!["-c".into(), script.into()]);
        detector.attach(MountPoint::Root);
        detector
    }

    #[test]
    fn test_parse_rejection() {
        let err = parse_rejection(br#"{"livenessError":"FaceNotFound"}"#);
        assert_eq!(err.liveness_error.as_deref(), Some("FaceNotFound"));
        assert_eq!(err.recognition_error, None);

        assert_eq!(parse_rejection(b"segfault"), LivenessDetectionError::default());
        assert_eq!(parse_rejection(b""), LivenessDetectionError::default());
    }

    #[test]
    fn test_detach_requires_matching_mount() {
        let mut detector = CommandDetector::new("true", vec![]);
        detector.attach(MountPoint::Visible);
        assert!(detector.detach(MountPoint::Root).is_err());
        assert!(detector.detach(MountPoint::Visible).is_ok());
        assert_eq!(detector.mount(), None);
        assert!(detector.detach(MountPoint::Visible).is_err());
    }

    #[test]
    fn test_factory_requires_program() {
        assert!(CommandDetectorFactory::from_command(&[]).is_none());
        assert!(CommandDetectorFactory::from_command(&["helper".into()]).is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_success_receives_token() {
        let mut detector = sh(r#"test "$LIVENESS_AUTH_TOKEN" = "tok-123""#);
        assert!(detector.start("tok-123").await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_rejection_details() {
        let mut detector =
            sh(r#"echo '{"livenessError":"LookAway","recognitionError":"Mismatch"}'; exit 3"#);
        let err = detector.start("tok").await.unwrap_err();
        assert_eq!(err.liveness_error.as_deref(), Some("LookAway"));
        assert_eq!(err.recognition_error.as_deref(), Some("Mismatch"));
    }

    #[tokio::test]
    async fn test_missing_helper_rejects() {
        let mut detector = CommandDetector::new("/nonexistent/vendor-helper", vec![]);
        let err = detector.start("tok").await.unwrap_err();
        assert!(err
            .liveness_error
            .unwrap()
            .starts_with("failed to launch /nonexistent/vendor-helper"));
    }
}
