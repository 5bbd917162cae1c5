use liveness_core::OperationMode;

/// Client configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the backend serving the token and result routes.
    pub api_base_url: String,
    /// Path of the token route (default: /api/generateAccessToken).
    pub token_path: String,
    /// Path of the session-result route (default: /api/getSessionResult).
    pub result_path: String,
    /// V4L2 device path for the manual capture flow (default: /dev/video0).
    pub camera_device: String,
    /// Number of frames to discard after opening the camera.
    pub warmup_frames: usize,
    /// Operation mode requested when none is given on the command line.
    pub operation_mode: OperationMode,
    /// Vendor capture helper, program followed by its arguments.
    pub detector_command: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            token_path: "/api/generateAccessToken".to_string(),
            result_path: "/api/getSessionResult".to_string(),
            camera_device: "/dev/video0".to_string(),
            warmup_frames: 4,
            operation_mode: OperationMode::Passive,
            detector_command: None,
        }
    }
}

impl Config {
    /// Load configuration from `LIVENESS_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let operation_mode = match lookup("LIVENESS_OPERATION_MODE") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring LIVENESS_OPERATION_MODE");
                defaults.operation_mode
            }),
            None => defaults.operation_mode,
        };

        Self {
            api_base_url: lookup("LIVENESS_API_BASE_URL").unwrap_or(defaults.api_base_url),
            token_path: lookup("LIVENESS_TOKEN_PATH").unwrap_or(defaults.token_path),
            result_path: lookup("LIVENESS_RESULT_PATH").unwrap_or(defaults.result_path),
            camera_device: lookup("LIVENESS_CAMERA_DEVICE").unwrap_or(defaults.camera_device),
            warmup_frames: lookup("LIVENESS_WARMUP_FRAMES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.warmup_frames),
            operation_mode,
            detector_command: lookup("LIVENESS_DETECTOR_COMMAND").and_then(|v| split_command(&v)),
        }
    }
}

fn split_command(raw: &str) -> Option<Vec<String>> {
    let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}
