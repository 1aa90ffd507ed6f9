use thiserror::Error;

/// Failure taxonomy for the tracking subsystem. Every variant is caught at
/// the event-handler boundary; none may tear down a connection.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("not a party to this booking")]
    Authorization,
    /// Rendered to clients exactly like `Authorization`, so probing booking
    /// ids reveals nothing about which ones exist.
    #[error("booking not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(&'static str),
}

impl TrackingError {
    /// Short same-channel message for the originating connection. No stack
    /// traces, no internal identifiers.
    pub fn client_message(&self) -> &'static str {
        match self {
            TrackingError::Authentication(_) => "Authentication failed",
            TrackingError::Authorization | TrackingError::NotFound => {
                "Not authorized for this booking"
            }
            TrackingError::Storage(_) | TrackingError::Internal(_) => {
                "Something went wrong, please try again"
            }
        }
    }
}
