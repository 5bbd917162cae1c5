use serde::{Deserialize, Serialize};

/// Liveness operation mode requested from the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperationMode {
    /// Passive check only.
    #[default]
    Passive,
    /// Passive check combined with an active challenge.
    PassiveActive,
}

impl OperationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::Passive => "Passive",
            OperationMode::PassiveActive => "PassiveActive",
        }
    }
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "passive" => Ok(OperationMode::Passive),
            "passiveactive" | "passive+active" | "passive-active" => {
                Ok(OperationMode::PassiveActive)
            }
            _ => Err(format!("unknown operation mode: {s}")),
        }
    }
}

/// Kind of result the session-result endpoint is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "detectLiveness")]
    DetectLiveness,
    #[serde(rename = "detectLivenessWithVerify")]
    DetectLivenessWithVerify,
}

impl ActionKind {
    /// Liveness with verification iff a reference image accompanies the attempt.
    pub fn for_reference(has_reference: bool) -> Self {
        if has_reference {
            ActionKind::DetectLivenessWithVerify
        } else {
            ActionKind::DetectLiveness
        }
    }

    pub fn includes_verification(&self) -> bool {
        matches!(self, ActionKind::DetectLivenessWithVerify)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::DetectLiveness => "detectLiveness",
            ActionKind::DetectLivenessWithVerify => "detectLivenessWithVerify",
        }
    }
}

/// Short-lived credential for one liveness attempt.
///
/// Never persisted; dropped once the attempt completes or fails.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAuthorization {
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub session_id: String,
}

impl SessionAuthorization {
    /// Both the token and the session id are present.
    pub fn is_complete(&self) -> bool {
        !self.auth_token.is_empty() && !self.session_id.is_empty()
    }
}

// The auth token is a bearer credential and stays out of logs.
impl std::fmt::Debug for SessionAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthorization")
            .field("auth_token", &"<redacted>")
            .field("session_id", &self.session_id)
            .finish()
    }
}

/// Decision record returned by the session-result endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: SessionResults,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionResults {
    #[serde(default, deserialize_with = "null_as_default")]
    pub attempts: Vec<Attempt>,
}

/// The backend sends `null` for sections it has not produced yet.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl SessionResult {
    /// The attempt the verdict is taken from. Later attempts are ignored.
    pub fn first_attempt(&self) -> Option<&Attempt> {
        self.results.attempts.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    #[serde(default)]
    pub result: Option<AttemptResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    /// `"realface"` for a live subject; any other value is treated as a spoof.
    #[serde(default)]
    pub liveness_decision: String,
    #[serde(default)]
    pub verify_result: Option<VerifyResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub is_identical: bool,
}

/// Rejection reported by the vendor capture component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("liveness session rejected: {}", .liveness_error.as_deref().unwrap_or("no detail"))]
pub struct LivenessDetectionError {
    #[serde(default)]
    pub liveness_error: Option<String>,
    #[serde(default)]
    pub recognition_error: Option<String>,
}

impl LivenessDetectionError {
    /// Rejection carrying only a liveness reason.
    pub fn liveness(reason: impl Into<String>) -> Self {
        Self {
            liveness_error: Some(reason.into()),
            recognition_error: None,
        }
    }
}

/// File-like payload uploaded alongside a token request.
#[derive(Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ReferenceImage {
    pub fn png(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: "image/png".to_string(),
            bytes,
        }
    }
}

impl std::fmt::Debug for ReferenceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceImage")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_authorization_wire_names() {
        let auth: SessionAuthorization =
            serde_json::from_str(r#"{"authToken":"tok","sessionId":"sid"}"#).unwrap();
        assert_eq!(auth.auth_token, "tok");
        assert_eq!(auth.session_id, "sid");
        assert!(auth.is_complete());
    }

    #[test]
    fn test_session_authorization_incomplete() {
        let auth: SessionAuthorization = serde_json::from_str(r#"{"authToken":"tok"}"#).unwrap();
        assert!(!auth.is_complete());
    }

    #[test]
    fn test_debug_redacts_token() {
        let auth = SessionAuthorization {
            auth_token: "secret-token".into(),
            session_id: "sid".into(),
        };
        let printed = format!("{auth:?}");
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("sid"));
    }

    #[test]
    fn test_session_result_missing_results_is_empty() {
        let result: SessionResult = serde_json::from_str("{}").unwrap();
        assert!(result.first_attempt().is_none());
    }

    #[test]
    fn test_session_result_null_attempts_is_empty() {
        let result: SessionResult =
            serde_json::from_str(r#"{"results":{"attempts":null}}"#).unwrap();
        assert!(result.first_attempt().is_none());
        let result: SessionResult = serde_json::from_str(r#"{"results":null}"#).unwrap();
        assert!(result.first_attempt().is_none());
    }

    #[test]
    fn test_session_result_decodes_verify() {
        let json = r#"{"results":{"attempts":[
            {"result":{"livenessDecision":"realface","verifyResult":{"isIdentical":true}}},
            {"result":{"livenessDecision":"spoofface"}}
        ]}}"#;
        let result: SessionResult = serde_json::from_str(json).unwrap();
        let first = result.first_attempt().unwrap().result.as_ref().unwrap();
        assert_eq!(first.liveness_decision, "realface");
        assert_eq!(first.verify_result, Some(VerifyResult { is_identical: true }));
    }

    #[test]
    fn test_action_kind_from_reference() {
        assert_eq!(ActionKind::for_reference(false), ActionKind::DetectLiveness);
        assert_eq!(
            ActionKind::for_reference(true),
            ActionKind::DetectLivenessWithVerify
        );
        assert_eq!(
            serde_json::to_string(&ActionKind::DetectLivenessWithVerify).unwrap(),
            "\"detectLivenessWithVerify\""
        );
    }

    #[test]
    fn test_operation_mode_parse() {
        assert_eq!("passive".parse::<OperationMode>(), Ok(OperationMode::Passive));
        assert_eq!(
            "Passive+Active".parse::<OperationMode>(),
            Ok(OperationMode::PassiveActive)
        );
        assert!("active".parse::<OperationMode>().is_err());
    }

    #[test]
    fn test_detection_error_decodes_partial() {
        let err: LivenessDetectionError =
            serde_json::from_str(r#"{"recognitionError":"FaceMismatch"}"#).unwrap();
        assert_eq!(err.liveness_error, None);
        assert_eq!(err.recognition_error.as_deref(), Some("FaceMismatch"));
    }
}
