//! Error types for Reel

use thiserror::Error;

/// Result type alias using ReelError
pub type Result<T> = std::result::Result<T, ReelError>;

/// Main error type for Reel operations
///
/// Errors fall into three groups:
/// - capacity errors, which the UI layer should surface and recover from;
/// - contract violations, which point at a bug in the caller;
/// - backend errors, which are fatal for the session.
#[derive(Debug, Error)]
pub enum ReelError {
    /// The stream table is full
    #[error("Stream limit reached ({max} streams)")]
    StreamLimitReached { max: usize },

    /// The draw context table is full
    #[error("Draw context limit reached ({max} sources)")]
    DrawLimitReached { max: usize },

    /// Handle does not map to a live slot
    #[error("Invalid or stale handle: {0}")]
    InvalidHandle(String),

    /// Placement rectangle outside the unit square, or a degenerate edge drag
    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    /// Frame byte length does not match the stream's size
    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSizeMismatch { expected: usize, actual: usize },

    /// Stream already queued for removal
    #[error("Removal already pending for {0}")]
    RemovalPending(String),

    /// Destination region larger than the source region
    #[error("Upscaling is not supported: {0}")]
    UpscaleUnsupported(String),

    /// Zero or oversized image dimensions
    #[error("Invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// GPU backend failure (image creation, memory mapping, submission)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Fence did not signal within the configured timeout
    #[error("Fence wait timed out after {0:?}")]
    FenceTimeout(std::time::Duration),

    /// Unsupported operation or format
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ReelError>,
    },
}

impl ReelError {
    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a placement error
    pub fn placement(msg: impl Into<String>) -> Self {
        Self::InvalidPlacement(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through context wrappers
    pub fn root(&self) -> &ReelError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Capacity errors: the caller should decline the action and tell the user
    pub fn is_capacity(&self) -> bool {
        matches!(
            self.root(),
            Self::StreamLimitReached { .. } | Self::DrawLimitReached { .. }
        )
    }

    /// Errors that indicate a bug in the calling component
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self.root(),
            Self::InvalidHandle(_)
                | Self::InvalidPlacement(_)
                | Self::FrameSizeMismatch { .. }
                | Self::RemovalPending(_)
                | Self::UpscaleUnsupported(_)
                | Self::InvalidDimensions { .. }
        )
    }

    /// Errors the session cannot continue after
    pub fn is_fatal(&self) -> bool {
        matches!(self.root(), Self::Backend(_) | Self::FenceTimeout(_))
    }

    /// Check if this error can be fixed by the user without code changes
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self.root(),
            Self::StreamLimitReached { .. }
                | Self::DrawLimitReached { .. }
                | Self::Config(_)
                | Self::Io(_)
        )
    }

    /// Short actionable hint for the user, where one exists
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::StreamLimitReached { .. } => {
                Some("Remove an existing source or raise [streams] max_streams in config.toml")
            }
            Self::DrawLimitReached { .. } => {
                Some("Remove a placed source or raise [streams] max_draw_contexts in config.toml")
            }
            Self::Config(_) => Some("Check ~/.config/reel/config.toml or run 'reel config init --force'"),
            Self::FenceTimeout(_) => Some("The GPU stopped responding; restart the session"),
            Self::Unsupported(_) => Some("Use a 4-byte pixel format such as rgba or bgrx"),
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl From<toml::de::Error> for ReelError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("Failed to parse config file: {}", err))
    }
}

impl From<toml::ser::Error> for ReelError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(format!("Failed to serialize config: {}", err))
    }
}
