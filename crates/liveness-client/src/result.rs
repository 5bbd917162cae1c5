//! Fetch and present the decision record of a finished session.

use std::sync::Arc;

use liveness_core::{ActionKind, ResultError, SessionAuthorization, VerdictPresentation};
use thiserror::Error;

use crate::api::{ApiError, LivenessApi};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("No session data")]
    MissingSession,
    #[error("failed to fetch session result: {0}")]
    Api(#[from] ApiError),
    #[error(transparent)]
    Invalid(#[from] ResultError),
}

pub struct ResultFetcher {
    api: Arc<dyn LivenessApi>,
}

impl ResultFetcher {
    pub fn new(api: Arc<dyn LivenessApi>) -> Self {
        Self { api }
    }

    /// Fetch the result of the session `auth` was issued for, once.
    ///
    /// Requires the authorization of the same attempt; an incomplete one
    /// short-circuits without a request.
    pub async fn fetch(
        &self,
        action: ActionKind,
        auth: &SessionAuthorization,
    ) -> Result<VerdictPresentation, FetchError> {
        if !auth.is_complete() {
            return Err(FetchError::MissingSession);
        }

        let result = self.api.session_result(action, &auth.session_id).await?;
        tracing::debug!(
            session_id = %auth.session_id,
            attempts = result.results.attempts.len(),
            "session result received"
        );

        let presentation = VerdictPresentation::from_session_result(&result, action)?;
        tracing::info!(
            session_id = %auth.session_id,
            liveness = %presentation.liveness.text,
            recognition = presentation.recognition.as_ref().map(|r| r.text.as_str()),
            "session verdict"
        );
        Ok(presentation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::FakeApi;
    use liveness_core::{Attempt, AttemptResult, Icon, SessionResult, VerifyResult};
    use liveness_core::types::SessionResults;
    use std::sync::atomic::Ordering;

    fn auth() -> SessionAuthorization {
        SessionAuthorization {
            auth_token: "token-1".into(),
            session_id: "session-1".into(),
        }
    }

    fn result(attempts: Vec<Attempt>) -> SessionResult {
        SessionResult {
            results: SessionResults { attempts },
        }
    }

    #[tokio::test]
    async fn test_fetch_maps_first_attempt() {
        let api = Arc::new(FakeApi::default());
        api.set_result(Ok(result(vec![Attempt {
            result: Some(AttemptResult {
                liveness_decision: "realface".into(),
                verify_result: Some(VerifyResult { is_identical: false }),
            }),
        }])));
        let fetcher = ResultFetcher::new(api.clone());

        let p = fetcher
            .fetch(ActionKind::DetectLivenessWithVerify, &auth())
            .await
            .unwrap();
        assert_eq!(p.liveness.icon, Icon::Checkmark);
        assert_eq!(p.recognition.unwrap().text, "Not the same person");
        assert_eq!(
            api.last_session_id.lock().unwrap().as_deref(),
            Some("session-1")
        );
        assert_eq!(
            *api.last_action.lock().unwrap(),
            Some(ActionKind::DetectLivenessWithVerify)
        );
    }

    #[tokio::test]
    async fn test_fetch_without_session_makes_no_request() {
        let api = Arc::new(FakeApi::default());
        let fetcher = ResultFetcher::new(api.clone());
        let stale = SessionAuthorization {
            auth_token: String::new(),
            session_id: String::new(),
        };
        let err = fetcher
            .fetch(ActionKind::DetectLiveness, &stale)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MissingSession));
        assert_eq!(api.result_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_reports_no_attempts() {
        let api = Arc::new(FakeApi::default());
        api.set_result(Ok(result(vec![])));
        let err = ResultFetcher::new(api)
            .fetch(ActionKind::DetectLiveness, &auth())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Liveness session incomplete: No attempts found in results"
        );
    }

    #[tokio::test]
    async fn test_fetch_reports_missing_result() {
        let api = Arc::new(FakeApi::default());
        api.set_result(Ok(result(vec![Attempt { result: None }])));
        let err = ResultFetcher::new(api)
            .fetch(ActionKind::DetectLiveness, &auth())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Invalid(ResultError::NoResult)));
    }

    #[tokio::test]
    async fn test_fetch_transport_error() {
        let api = Arc::new(FakeApi::default());
        api.set_result(Err("gateway".into()));
        let err = ResultFetcher::new(api)
            .fetch(ActionKind::DetectLiveness, &auth())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Api(_)));
    }
}
