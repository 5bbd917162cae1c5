//! liveness-core — Data model and verdict mapping for remote face liveness sessions.
//!
//! The liveness decision itself is made by the remote service; this crate
//! only decodes its records and projects them into icon/text pairs.

pub mod types;
pub mod verdict;
pub mod view;

pub use types::{
    ActionKind, Attempt, AttemptResult, LivenessDetectionError, OperationMode, ReferenceImage,
    SessionAuthorization, SessionResult, VerifyResult,
};
pub use verdict::{Icon, ResultError, Verdict, VerdictPresentation};
pub use view::{LivenessView, ViewState};
