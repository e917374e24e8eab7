//! Toolkit runtime error types.

use thiserror::Error;

/// Toolkit runtime errors.
#[derive(Error, Debug)]
pub enum ToolkitError {
    /// The message handler was already installed.
    #[error("Toolkit already initialized")]
    AlreadyInitialized,

    /// An operation needs the Bootstrap message to have been handled first.
    #[error("Toolkit has not been bootstrapped")]
    NotBootstrapped,

    /// Two declared features share a name.
    #[error("Feature already declared: {0}")]
    DuplicateFeature(String),

    /// A lifecycle hook callback failed during dispatch.
    #[error("Hook for '{component}' ({event}) registered by '{feature}' failed: {message}")]
    Hook {
        feature: String,
        component: String,
        event: String,
        message: String,
    },

    /// The host never reported ready within the configured attempts.
    #[error("Host not ready after {attempts} attempts")]
    ReadinessTimeout { attempts: u32 },

    /// The inbound message channel is closed.
    #[error("Message channel closed")]
    ChannelClosed,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ToolkitError {
    /// Create a hook error.
    pub fn hook(
        feature: impl Into<String>,
        component: impl Into<String>,
        event: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Hook {
            feature: feature.into(),
            component: component.into(),
            event: event.into(),
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for ToolkitError {
    fn from(err: toml::de::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for ToolkitError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type alias for toolkit operations.
pub type Result<T> = std::result::Result<T, ToolkitError>;
