//! Caller-facing error types.
//!
//! Most of the crate returns `anyhow::Result`. [`RequestError`] is the one
//! typed error callers need to branch on: the HTTP layer maps it to
//! `400 bad_request` and everything else to `500 internal`.

/// A request that is invalid before any retrieval happens.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    /// A required string or list field was empty.
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    /// A numeric field was outside its accepted range.
    #[error("{field} {message}")]
    OutOfRange {
        field: &'static str,
        message: String,
    },
}

impl RequestError {
    pub fn empty(field: &'static str) -> Self {
        Self::Empty { field }
    }

    pub fn out_of_range(field: &'static str, message: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            RequestError::empty("institution").to_string(),
            "institution must not be empty"
        );
        assert_eq!(
            RequestError::out_of_range("duration_hours", "must be > 0").to_string(),
            "duration_hours must be > 0"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = RequestError::empty("topics").into();
        assert!(err.downcast_ref::<RequestError>().is_some());
    }
}
