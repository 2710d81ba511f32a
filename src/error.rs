use thiserror::Error;

/// Main player error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("CLI parse error: {0}")]
    Parse(#[from] crate::cli::ParseError),
}

impl PlayerError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Resource(err) => err.user_message(),
            PlayerError::Decode(err) => err.user_message(),
            PlayerError::Audio(err) => err.user_message(),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::Parse(err) => format!("Command error: {}", err),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlayerError::Resource(err) => err.recovery_suggestions(),
            PlayerError::Decode(err) => err.recovery_suggestions(),
            PlayerError::Audio(err) => err.recovery_suggestions(),
            PlayerError::Config(err) => err.recovery_suggestions(),
            PlayerError::Parse(_) => vec!["Type 'help' to see available commands".to_string()],
        }
    }

    /// Whether the player keeps running normally after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            PlayerError::Resource(_) => true, // channel keeps its previous track
            PlayerError::Decode(_) => true,   // channel is left empty, pick another track
            PlayerError::Audio(err) => err.is_recoverable(),
            PlayerError::Config(_) => true, // built-in defaults stay in effect
            PlayerError::Parse(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Resource(_) => ErrorSeverity::Warning,
            PlayerError::Decode(_) => ErrorSeverity::Error,
            PlayerError::Audio(AudioError::DeviceUnavailable(_)) => ErrorSeverity::Critical,
            PlayerError::Audio(_) => ErrorSeverity::Error,
            PlayerError::Config(_) => ErrorSeverity::Warning,
            PlayerError::Parse(_) => ErrorSeverity::Info,
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error | ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Failures to locate a bundled audio resource
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResourceError {
    #[error("Resource not found: {name}")]
    NotFound { name: String },
}

impl ResourceError {
    pub fn user_message(&self) -> String {
        match self {
            ResourceError::NotFound { name } => {
                format!("No bundled audio named '{}' could be found", name)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ResourceError::NotFound { .. } => vec![
                "Use 'list' to see the available tracks".to_string(),
                "Check the resource root with --root or in config.toml".to_string(),
                "Names may omit the .mp3 extension and may include a subdirectory".to_string(),
            ],
        }
    }
}

/// Failures to open or decode a located resource
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to open resource: {0}")]
    Open(String),

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("No decodable audio track")]
    NoAudioTrack,

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Output stream failed: {0}")]
    OutputFailed(String),
}

impl DecodeError {
    pub fn user_message(&self) -> String {
        match self {
            DecodeError::Open(msg) => format!("Audio file could not be opened: {}", msg),
            DecodeError::UnsupportedFormat { format } => {
                format!("Audio format '{}' is not supported", format)
            }
            DecodeError::NoAudioTrack => "The file does not contain an audio track".to_string(),
            DecodeError::DecodeFailed(msg) => format!("Failed to decode audio data: {}", msg),
            DecodeError::OutputFailed(msg) => {
                format!("Audio output could not be prepared for this track: {}", msg)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            DecodeError::Open(_) => vec![
                "Check file permissions for the resource root".to_string(),
            ],
            DecodeError::UnsupportedFormat { .. } | DecodeError::NoAudioTrack => vec![
                "Supported formats: MP3, FLAC, WAV, OGG/Vorbis, M4A/AAC".to_string(),
                "Check if the file extension matches the actual format".to_string(),
            ],
            DecodeError::DecodeFailed(_) => vec![
                "Try re-copying the file into the resource root".to_string(),
                "Verify the file is not corrupted".to_string(),
            ],
            DecodeError::OutputFailed(_) => vec![
                "Check that an audio output device is connected".to_string(),
                "Close other applications holding exclusive audio access".to_string(),
            ],
        }
    }
}

/// Audio device and runtime errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Unsupported sample format: {format}")]
    UnsupportedSampleFormat { format: String },

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Audio initialization failed: {0}")]
    InitializationFailed(String),
}

impl AudioError {
    pub fn user_message(&self) -> String {
        match self {
            AudioError::DeviceUnavailable(msg) => {
                format!("No usable audio output device: {}", msg)
            }
            AudioError::UnsupportedSampleFormat { format } => {
                format!("The output device uses an unsupported sample format ({})", format)
            }
            AudioError::StreamError(msg) => format!("Audio playback interrupted: {}", msg),
            AudioError::InitializationFailed(msg) => {
                format!("Failed to initialize audio system: {}", msg)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            AudioError::DeviceUnavailable(_) => vec![
                "Check that your audio device is connected and powered on".to_string(),
                "Restart the application to refresh the device list".to_string(),
            ],
            AudioError::UnsupportedSampleFormat { .. } => vec![
                "Select a different default output device in your system settings".to_string(),
            ],
            AudioError::StreamError(_) => vec![
                "Stop and play the track again".to_string(),
                "Check audio device connections".to_string(),
            ],
            AudioError::InitializationFailed(_) => vec![
                "Restart the application".to_string(),
                "Verify audio drivers are properly installed".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            AudioError::DeviceUnavailable(_) => false,
            AudioError::UnsupportedSampleFormat { .. } => false,
            AudioError::StreamError(_) => true,
            AudioError::InitializationFailed(_) => false,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => format!("Cannot access configuration file: {}", err),
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
                "Pass a configuration file explicitly with --config".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
                "Ensure the disk is not full".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Configuration will use default values".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete the configuration file to reset to defaults".to_string(),
                "Check the configuration file format manually".to_string(),
            ],
        }
    }
}
