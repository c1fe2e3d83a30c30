use std::convert::Infallible;
use std::error::Error as StdError;
use std::rc::Rc;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RequestError>;

/// Failure of a single execution, as stored in the controller's `error` cell.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// The request rejected with a reason that was not itself an error value.
    #[error("{message}")]
    Rejected { message: String },

    /// The request rejected with an error value, kept as-is.
    #[error("{0}")]
    Failed(Rc<dyn StdError>),

    /// The execution was abandoned by `abort`, `reset`, or a newer execute.
    #[error("request aborted")]
    Aborted,
}

impl RequestError {
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn failed(error: impl StdError + 'static) -> Self {
        Self::Failed(Rc::new(error))
    }

    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Normalization of a request's rejection reason into a [`RequestError`].
///
/// Error values pass through unchanged; bare reasons such as strings are
/// wrapped. Implement this for custom rejection types.
pub trait IntoRequestError {
    fn into_request_error(self) -> RequestError;
}

impl IntoRequestError for RequestError {
    fn into_request_error(self) -> RequestError {
        self
    }
}

impl IntoRequestError for String {
    fn into_request_error(self) -> RequestError {
        RequestError::Rejected { message: self }
    }
}

impl IntoRequestError for &'static str {
    fn into_request_error(self) -> RequestError {
        RequestError::rejected(self)
    }
}

impl IntoRequestError for Box<dyn StdError> {
    fn into_request_error(self) -> RequestError {
        RequestError::Failed(Rc::from(self))
    }
}

impl IntoRequestError for std::io::Error {
    fn into_request_error(self) -> RequestError {
        RequestError::failed(self)
    }
}

impl IntoRequestError for Infallible {
    fn into_request_error(self) -> RequestError {
        match self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_reason_is_wrapped() {
        let err = "boom".into_request_error();
        assert!(matches!(err, RequestError::Rejected { .. }));
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn error_value_passes_through() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "upstream timed out");
        let err = io.into_request_error();
        assert!(matches!(err, RequestError::Failed(_)));
        assert_eq!(err.message(), "upstream timed out");
    }

    #[test]
    fn request_error_is_identity() {
        let err = RequestError::Aborted.into_request_error();
        assert!(err.is_aborted());
        assert_eq!(err.to_string(), "request aborted");
    }

    #[test]
    fn boxed_error_keeps_message() {
        let boxed: Box<dyn StdError> = "bad gateway".into();
        let err = boxed.into_request_error();
        assert_eq!(err.message(), "bad gateway");
        assert!(!err.is_aborted());
    }

    #[test]
    fn clones_share_failure() {
        let err = RequestError::failed(std::fmt::Error);
        let copy = err.clone();
        assert_eq!(err.message(), copy.message());
    }
}
