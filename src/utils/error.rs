use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Session state error ({path}): {message}")]
    SessionError { path: String, message: String },

    #[error("Navigation to {url} failed after {attempts} attempt(s): {message}")]
    NavigationError {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Browser error: {message}")]
    BrowserError { message: String },

    #[error("Notification error: {message}")]
    NotificationError { message: String },

    #[error("State not found: {path}")]
    StateNotFound { path: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Browser,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MonitorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MonitorError::ConfigError { .. }
            | MonitorError::MissingConfigError { .. }
            | MonitorError::InvalidConfigValueError { .. }
            | MonitorError::ConfigValidationError { .. }
            | MonitorError::SessionError { .. } => ErrorCategory::Configuration,
            MonitorError::HttpError(_)
            | MonitorError::NavigationError { .. }
            | MonitorError::NotificationError { .. } => ErrorCategory::Network,
            MonitorError::BrowserError { .. } => ErrorCategory::Browser,
            MonitorError::CsvError(_)
            | MonitorError::SerializationError(_)
            | MonitorError::StateNotFound { .. } => ErrorCategory::Data,
            MonitorError::IoError(_) | MonitorError::StorageError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Browser => ErrorSeverity::Critical,
            ErrorCategory::Data => match self {
                MonitorError::StateNotFound { .. } => ErrorSeverity::Low,
                _ => ErrorSeverity::High,
            },
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            MonitorError::SessionError { path, .. } => format!(
                "Regenerate the browser session (storage_state.json) and mount it at {}",
                path
            ),
            MonitorError::MissingConfigError { field } => {
                format!("Set {} via command line flag, environment or TOML config", field)
            }
            MonitorError::InvalidConfigValueError { field, .. }
            | MonitorError::ConfigValidationError { field, .. } => {
                format!("Check the value configured for {}", field)
            }
            MonitorError::ConfigError { .. } => "Check the monitor configuration".to_string(),
            MonitorError::HttpError(_) | MonitorError::NavigationError { .. } => {
                "Check network connectivity and that the target page is reachable".to_string()
            }
            MonitorError::NotificationError { .. } => {
                "Check IFTTT_KEY and IFTTT_EVENT".to_string()
            }
            MonitorError::BrowserError { .. } => {
                "Ensure Chrome/Chromium is installed or set CHROME to its path".to_string()
            }
            MonitorError::StateNotFound { .. } => {
                "No saved state yet; it will be created after the first alert".to_string()
            }
            MonitorError::CsvError(_) | MonitorError::SerializationError(_) => {
                "Remove or repair the state/history file".to_string()
            }
            MonitorError::IoError(_) | MonitorError::StorageError { .. } => {
                "Check file permissions and available disk space".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Browser => format!("Browser problem: {}", self),
            ErrorCategory::Data => format!("Data problem: {}", self),
            ErrorCategory::System => format!("System problem: {}", self),
        }
    }

    /// 給進程退出碼用
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_is_configuration() {
        let err = MonitorError::SessionError {
            path: "/etc/secrets/storage_state.json".to_string(),
            message: "not found".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.exit_code(), 1);
        assert!(err.recovery_suggestion().contains("storage_state.json"));
    }

    #[test]
    fn test_exit_codes_follow_severity() {
        let nav = MonitorError::NavigationError {
            url: "https://example.com".to_string(),
            attempts: 3,
            message: "timeout".to_string(),
        };
        assert_eq!(nav.exit_code(), 2);

        let missing = MonitorError::StateNotFound {
            path: "state.json".to_string(),
        };
        assert_eq!(missing.exit_code(), 0);

        let browser = MonitorError::BrowserError {
            message: "no chrome".to_string(),
        };
        assert_eq!(browser.exit_code(), 3);
    }
}
