//! Error types for the authentication guard
//!
//! Only three variants are meant to reach the login caller:
//! [`Error::AccountLocked`], [`Error::InvalidCredentials`] and [`Error::Store`].
//! Everything else is produced by best-effort paths (audit persistence,
//! notification dispatch, reporting reads) or during startup.

use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// The account is locked; credentials were not checked
    #[error("Account locked for another {remaining_minutes} minute(s)")]
    AccountLocked {
        /// Whole minutes until the lock expires (rounded up)
        remaining_minutes: i64,
    },

    /// Credentials were rejected while the account is still unlocked
    #[error("Invalid credentials")]
    InvalidCredentials {
        /// Advisory message when the attempt count is in the warning band
        warning: Option<String>,
    },

    /// The ephemeral counter/lock store could not be reached
    ///
    /// Callers must deny access when they see this error.
    #[error("Lockout store unavailable: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Redis error
    #[cfg(feature = "cache")]
    #[error("Redis error: {0}")]
    Redis(Box<redis::RedisError>),

    /// Database error
    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(String),

    /// Audit logging error
    #[error("Audit error: {0}")]
    Audit(String),

    /// Notification dispatch error
    #[error("Notification error: {0}")]
    Notification(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error must stop the authentication attempt
    ///
    /// Lockout and store outages deny access; everything else is either a
    /// normal credential rejection or a best-effort failure.
    pub fn denies_access(&self) -> bool {
        match self {
            Self::AccountLocked { .. } | Self::Store(_) => true,
            #[cfg(feature = "cache")]
            Self::Redis(_) => true,
            _ => false,
        }
    }

    /// Message suitable for showing to the person trying to sign in
    pub fn user_message(&self) -> String {
        match self {
            Self::AccountLocked { remaining_minutes } => format!(
                "Account is temporarily locked due to too many failed login attempts. \
                 Please try again in {} minute(s).",
                remaining_minutes
            ),
            Self::InvalidCredentials {
                warning: Some(warning),
            } => format!("Invalid email or password. {}", warning),
            Self::InvalidCredentials { warning: None } => "Invalid email or password.".to_string(),
            Self::Store(_) => {
                "Sign-in is temporarily unavailable. Please try again later.".to_string()
            }
            #[cfg(feature = "cache")]
            Self::Redis(_) => {
                "Sign-in is temporarily unavailable. Please try again later.".to_string()
            }
            _ => "An unexpected error occurred".to_string(),
        }
    }
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(feature = "cache")]
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Redis(Box::new(err))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("Serialization failed: {}", err))
    }
}
