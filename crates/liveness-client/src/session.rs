//! Session initiation: one authorization request per attempt.

use std::sync::Arc;

use liveness_core::{OperationMode, ReferenceImage, SessionAuthorization};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::api::{ApiError, LivenessApi, TokenRequest};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to fetch session token: {0}")]
    Api(#[from] ApiError),
    #[error("No session data")]
    Incomplete,
    #[error("a session request is already in flight")]
    Busy,
}

/// Requests session authorizations and publishes a loading flag.
pub struct SessionInitiator {
    api: Arc<dyn LivenessApi>,
    loading: watch::Sender<bool>,
}

impl SessionInitiator {
    pub fn new(api: Arc<dyn LivenessApi>) -> Self {
        let (loading, _) = watch::channel(false);
        Self { api, loading }
    }

    /// Observe the loading flag. It is true exactly while a request is outstanding.
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Request a new authorization.
    ///
    /// With a reference image the backend prepares liveness together with
    /// identity verification against that image; without one, liveness only.
    pub async fn initiate(
        &self,
        mode: OperationMode,
        reference: Option<&ReferenceImage>,
    ) -> Result<SessionAuthorization, SessionError> {
        let claimed = self.loading.send_if_modified(|loading| {
            if *loading {
                false
            } else {
                *loading = true;
                true
            }
        });
        if !claimed {
            return Err(SessionError::Busy);
        }
        let _settled = LoadingGuard(&self.loading);

        let correlation_id = Uuid::new_v4().to_string();
        tracing::info!(
            mode = %mode,
            verify = reference.is_some(),
            correlation_id = %correlation_id,
            "requesting session authorization"
        );

        let auth = self
            .api
            .request_token(TokenRequest {
                mode,
                device_correlation_id: &correlation_id,
                reference,
            })
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "session authorization failed");
                e
            })?;

        if !auth.is_complete() {
            tracing::warn!(
                has_session_id = !auth.session_id.is_empty(),
                "token endpoint returned incomplete session data"
            );
            return Err(SessionError::Incomplete);
        }

        tracing::info!(session_id = %auth.session_id, "session authorized");
        Ok(auth)
    }
}

/// Clears the loading flag when the request settles or is dropped.
struct LoadingGuard<'a>(&'a watch::Sender<bool>);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}
