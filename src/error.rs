//! Error types shared across the store, submission and favorites layers.

use thiserror::Error;

/// Postgres NOT NULL violation
const NOT_NULL_VIOLATION: &str = "23502";
/// Postgres foreign key violation
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Remote store / content store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Request never produced a response (connection dropped, aborted, timed out)
    #[error("Network error: {0}")]
    Transport(String),

    /// Store answered with a non-2xx status
    #[error("Store error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Client is missing required settings
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Only transport-level failures are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }

    /// User-facing hint for errors that have a known cause
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            StoreError::Transport(_) => {
                Some("Network error. Please check your internet connection and try again.")
            }
            StoreError::Api {
                code: Some(code), ..
            } if code == NOT_NULL_VIOLATION => Some(
                "Please fill in all required fields (title, description, category, condition, location).",
            ),
            StoreError::Api {
                code: Some(code), ..
            } if code == FOREIGN_KEY_VIOLATION => {
                Some("Your session may have expired. Please refresh and try again.")
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else if err.is_builder() {
            StoreError::Config(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

/// Reasons a listing cannot be submitted yet. Raised before any network call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Please add at least one image")]
    NoImages,

    #[error("Please wait for all images to be analyzed before submitting ({count} pending)")]
    ImagesPending { count: usize },

    #[error("Please remove images that failed modesty analysis before submitting")]
    ImagesRejected { ids: Vec<String> },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Please enter a {0} greater than zero")]
    InvalidPrice(&'static str),

    #[error("Please provide a pickup location")]
    MissingLocation,

    #[error("A listing can have at most {max} images")]
    TooManyImages { max: usize },

    #[error("This listing has already been submitted")]
    AlreadySubmitted,

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("End date must be on or after start date")]
    InvalidRentalPeriod,

    #[error("Start date cannot be in the past")]
    RentalInPast,

    #[error("Minimum rental period is {min} days")]
    RentalTooShort { min: u32 },

    #[error("Maximum rental period is {max} days")]
    RentalTooLong { max: u32 },

    #[error("This listing is not available for rent")]
    ListingUnavailable,

    #[error("You cannot rent your own listing")]
    OwnListing,
}

/// Failure of the listing submission workflow
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to create listing: {0}")]
    Store(#[from] StoreError),
}

impl SubmissionError {
    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::Validation(err) => err.to_string(),
            SubmissionError::Store(err) => err
                .hint()
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure while reading or writing the favorites set
#[derive(Debug, Error)]
pub enum FavoritesError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Local favorites storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Local favorites file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
