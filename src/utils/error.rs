use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

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

    #[error("Serial device '{path}' is already open")]
    AlreadyOpen { path: String },

    #[error("Unable to open serial device '{path}': {source}")]
    DeviceOpenError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serial channel '{channel}': {message}")]
    ChannelError { channel: String, message: String },

    #[error("Write to '{path}' failed after {written} of {total} bytes: {source}")]
    WriteError {
        path: String,
        written: usize,
        total: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to open byte log '{path}': {source}")]
    LogFileError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Correction feed error: {message}")]
    FeedError { message: String },

    #[error("Reactor error: {message}")]
    ReactorError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Device,
    Network,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RelayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::TomlError(_)
            | RelayError::ConfigError { .. }
            | RelayError::MissingConfigError { .. }
            | RelayError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            RelayError::AlreadyOpen { .. }
            | RelayError::ChannelError { .. }
            | RelayError::DeviceOpenError { .. }
            | RelayError::WriteError { .. } => ErrorCategory::Device,
            RelayError::FeedError { .. } => ErrorCategory::Network,
            RelayError::IoError(_)
            | RelayError::LogFileError { .. }
            | RelayError::ReactorError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RelayError::WriteError { .. } => ErrorSeverity::Medium,
            RelayError::AlreadyOpen { .. } | RelayError::ChannelError { .. } => ErrorSeverity::Low,
            RelayError::ReactorError { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            RelayError::TomlError(_) => "Check the configuration file for TOML syntax errors",
            RelayError::ConfigError { .. } | RelayError::InvalidConfigValueError { .. } => {
                "Review the value against --help and correct the configuration"
            }
            RelayError::MissingConfigError { .. } => {
                "Provide the missing value on the command line, in the config file, or via environment"
            }
            RelayError::AlreadyOpen { .. } => "Close the channel before opening it again",
            RelayError::ChannelError { .. } => {
                "Open the channel before starting reads, and start reads only once"
            }
            RelayError::DeviceOpenError { .. } => {
                "Check that the receiver is connected, the path is correct, and you have permission to open it (dialout group)"
            }
            RelayError::WriteError { .. } => "Check the receiver connection; the device may have been unplugged",
            RelayError::LogFileError { .. } => "Check that the log directory exists and is writable",
            RelayError::FeedError { .. } => "Check the feed endpoint, credentials, and network connectivity",
            RelayError::IoError(_) => "Check file paths and permissions",
            RelayError::ReactorError { .. } => "Restart the relay; the I/O thread could not be created",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RelayError::MissingConfigError { field } => {
                format!("Missing required setting '{}'", field)
            }
            RelayError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            RelayError::DeviceOpenError { path, .. } => {
                format!("Could not open serial device {}", path)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
