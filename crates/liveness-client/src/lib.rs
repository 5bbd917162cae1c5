//! liveness-client — Orchestrates a remote face liveness session.
//!
//! A session runs in three steps: obtain an authorization from the token
//! endpoint ([`session`]), drive a capture surface ([`widget`] or
//! [`manual`]), then fetch and present the decision ([`result`]).

pub mod api;
pub mod capture;
pub mod config;
pub mod detector;
pub mod manual;
pub mod result;
pub mod session;
pub mod widget;

pub use api::{ApiError, HttpApi, LivenessApi, TokenRequest};
pub use capture::{CaptureError, CaptureSession, CaptureState};
pub use config::Config;
pub use detector::{CommandDetector, DetectorFactory, LivenessDetector, MountPoint};
pub use manual::ManualCapture;
pub use result::{FetchError, ResultFetcher};
pub use session::{SessionError, SessionInitiator};
pub use widget::WidgetCapture;
